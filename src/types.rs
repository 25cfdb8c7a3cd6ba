//! Settings types for point collection and the Gauss-Newton solver

use std::time::Duration;

/// Point collection settings
///
/// Controls the six-point ±1g pass and the capture of additional static
/// poses. The defaults are the values the procedure was validated with;
/// tests shrink the durations to run against scripted sample sources.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use accel_cal::CollectorSettings;
///
/// let settings = CollectorSettings {
///     capture_duration: Duration::from_secs(10), // Longer averaging window
///     extra_points: 5,                           // More angular diversity
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CollectorSettings {
    /// Interval between polls while waiting for a stable pose (typically 100 ms)
    pub poll_interval: Duration,
    /// Consecutive in-tolerance samples required before a pose counts as held
    ///
    /// Any sample breaking the streak restarts it from scratch.
    pub stability_streak: u32,
    /// Relative tolerance between the sample magnitude and the component on
    /// the axis under test (typically 0.05, i.e. within 5 %)
    pub magnitude_tolerance: f64,
    /// Length of the averaging window producing one calibration point
    /// (typically 5 s, sampled as fast as the source allows)
    pub capture_duration: Duration,
    /// Number of freely oriented static poses captured after the six-point
    /// pass
    ///
    /// The solver needs at least three of them on top of the six
    /// axis-aligned poses.
    pub extra_points: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            stability_streak: 10,
            magnitude_tolerance: 0.05,
            capture_duration: Duration::from_secs(5),
            extra_points: 3,
        }
    }
}

/// Gauss-Newton solver settings
///
/// The defaults are tuned for points already normalized to nominal unit-g
/// scale and should rarely need changing.
///
/// # Example
/// ```
/// use accel_cal::SolverSettings;
///
/// let settings = SolverSettings {
///     max_iterations: 500, // More headroom for noisy data
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Starting point for the parameter vector
    /// `[Mxx, Mxy, Mxz, Myy, Myz, Mzz, Bx, By, Bz]`
    ///
    /// The default is diagonal-dominant: scale factors near 5 with small
    /// cross-axis terms and bias.
    pub initial_guess: [f64; 9],
    /// Initial step gain applied to each Gauss-Newton update
    pub gain: f64,
    /// Damping parameter for the adaptive gain, must be below 1
    pub damping: f64,
    /// Largest relative per-parameter change at which iteration stops
    pub tolerance: f64,
    /// Iteration budget before the solver gives up
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            initial_guess: [5.0, 0.5, 0.5, 5.0, 0.5, 5.0, 0.5, 0.5, 0.5],
            gain: 1.0,
            damping: 0.01,
            tolerance: 1e-9,
            max_iterations: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_collector_settings() {
        let settings = CollectorSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert_eq!(settings.stability_streak, 10);
        assert_eq!(settings.magnitude_tolerance, 0.05);
        assert_eq!(settings.capture_duration, Duration::from_secs(5));
        assert_eq!(settings.extra_points, 3);
    }

    #[test]
    fn test_default_solver_settings() {
        let settings = SolverSettings::default();
        assert_eq!(
            settings.initial_guess,
            [5.0, 0.5, 0.5, 5.0, 0.5, 5.0, 0.5, 0.5, 0.5]
        );
        assert_eq!(settings.gain, 1.0);
        assert_eq!(settings.damping, 0.01);
        assert_eq!(settings.tolerance, 1e-9);
        assert_eq!(settings.max_iterations, 200);
    }
}
