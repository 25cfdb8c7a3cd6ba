//! Calibration point acquisition
//!
//! Implements the six-point ±1g protocol: every axis is held pointing down
//! and then up against gravity, each pose is debounced until the reading is
//! stable, and an averaging window turns the pose into one calibration
//! point. The two extremes per axis yield the closed-form zero offset and
//! sensitivity. Additional freely oriented static poses give the solver the
//! angular diversity it needs.

use std::thread;
use std::time::Instant;

use log::info;
use nalgebra::Vector3;

use crate::source::SampleSource;
use crate::types::CollectorSettings;

/// Requested direction of the axis under test relative to gravity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Axis points down; its reading should be negative.
    Downward,
    /// Axis points up; its reading should be positive.
    Upward,
}

impl Polarity {
    /// Whether a reading on the axis under test has the requested sign.
    /// A reading of exactly zero has no usable sign and never matches.
    fn matches(self, value: f64) -> bool {
        match self {
            Polarity::Downward => value < 0.0,
            Polarity::Upward => value > 0.0,
        }
    }
}

/// Debounce for the six-point pass.
///
/// A pose counts as held once a full streak of consecutive samples passes
/// the magnitude and sign checks; any failing sample restarts the streak
/// from scratch. The gate is a pure state machine fed one sample at a time,
/// so it can be exercised with scripted readings instead of hardware.
#[derive(Debug, Clone, Copy)]
pub struct StabilityGate {
    axis: usize,
    polarity: Polarity,
    magnitude_tolerance: f64,
    streak: u32,
    remaining: u32,
}

impl StabilityGate {
    /// Create a gate for one axis/polarity pose.
    ///
    /// # Arguments
    /// * `axis` - Index of the axis under test (0 = x, 1 = y, 2 = z)
    /// * `polarity` - Requested direction relative to gravity
    /// * `settings` - Streak length and magnitude tolerance
    pub fn new(axis: usize, polarity: Polarity, settings: &CollectorSettings) -> Self {
        Self {
            axis,
            polarity,
            magnitude_tolerance: settings.magnitude_tolerance,
            streak: settings.stability_streak,
            remaining: settings.stability_streak,
        }
    }

    /// Feed one sample; returns true once the pose has been held for the
    /// full streak.
    pub fn feed(&mut self, sample: &Vector3<f64>) -> bool {
        if self.accepts(sample) {
            self.remaining = self.remaining.saturating_sub(1);
        } else {
            self.remaining = self.streak;
        }
        self.remaining == 0
    }

    /// Whether one sample looks like the requested pose: the overall
    /// magnitude is dominated by the axis under test, and the sign on that
    /// axis matches the requested polarity.
    fn accepts(&self, sample: &Vector3<f64>) -> bool {
        let norm = sample.norm();
        if norm == 0.0 {
            return false;
        }
        let component = sample[self.axis];
        let deviation = (component.abs() - norm).abs() / norm;
        deviation < self.magnitude_tolerance && self.polarity.matches(component)
    }
}

/// Output of a full collection run: the recorded points in acquisition
/// order, plus the per-axis zero offset and sensitivity derived from the
/// six-point pass.
#[derive(Debug, Clone)]
pub struct CollectedPoints {
    /// Averaged static readings, six axis-aligned poses first
    pub points: Vec<Vector3<f64>>,
    /// Per-axis raw reading corresponding to 0 g
    pub zero: Vector3<f64>,
    /// Per-axis conversion from raw units to nominal g
    pub sensitivity: Vector3<f64>,
}

/// Orchestrates acquisition of all calibration points from a sample source.
///
/// Collection blocks the calling thread: it polls the source at the
/// configured interval while waiting for each pose and then reads as fast
/// as the source allows during the averaging window.
#[derive(Debug, Clone, Copy)]
pub struct PointCollector {
    settings: CollectorSettings,
}

impl PointCollector {
    /// Create a collector with the given settings.
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }

    /// Run the full protocol: the six-point ±1g pass followed by the
    /// configured number of freely oriented static poses.
    pub fn collect<S: SampleSource>(&self, source: &mut S) -> CollectedPoints {
        let mut collected = self.collect_six_point(source);
        for n in 0..self.settings.extra_points {
            info!(
                "capturing extra static pose {} of {}",
                n + 1,
                self.settings.extra_points
            );
            collected.points.push(self.capture_point(source));
        }
        collected
    }

    /// The six-point pass: wait for each axis to be held down and then up,
    /// average each pose into a point, and derive zero offset and
    /// sensitivity from the two extremes per axis.
    fn collect_six_point<S: SampleSource>(&self, source: &mut S) -> CollectedPoints {
        const AXES: [char; 3] = ['x', 'y', 'z'];

        let mut points = Vec::with_capacity(6 + self.settings.extra_points);
        let mut zero = Vector3::zeros();
        let mut sensitivity = Vector3::zeros();

        for axis in 0..3 {
            let mut extremes = [0.0; 2];
            for (slot, polarity) in [Polarity::Downward, Polarity::Upward].into_iter().enumerate() {
                info!("waiting for {} axis held {:?}", AXES[axis], polarity);
                self.wait_for_pose(source, axis, polarity);

                info!("{} axis {:?} stable, averaging", AXES[axis], polarity);
                let point = self.capture_point(source);
                extremes[slot] = point[axis];
                points.push(point);
            }

            // The larger of the two recorded extremes is the +1g reading,
            // whichever polarity produced it.
            let max = extremes[0].max(extremes[1]);
            let min = extremes[0].min(extremes[1]);
            zero[axis] = (max + min) / 2.0;
            sensitivity[axis] = 2.0 / (max - min);
        }

        CollectedPoints {
            points,
            zero,
            sensitivity,
        }
    }

    /// Poll the source until the stability gate opens for the requested
    /// pose.
    fn wait_for_pose<S: SampleSource>(&self, source: &mut S, axis: usize, polarity: Polarity) {
        let mut gate = StabilityGate::new(axis, polarity, &self.settings);
        loop {
            let sample = source.read_accelerometer();
            if gate.feed(&sample) {
                return;
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    /// Average one capture window into a single calibration point, reading
    /// as fast as the source allows. Always reads at least one sample.
    fn capture_point<S: SampleSource>(&self, source: &mut S) -> Vector3<f64> {
        let deadline = Instant::now() + self.settings.capture_duration;
        let mut sum = Vector3::zeros();
        let mut count = 0u32;
        loop {
            sum += source.read_accelerometer();
            count += 1;
            if Instant::now() >= deadline {
                break;
            }
        }
        sum / f64::from(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;

    struct ScriptedSource {
        samples: VecDeque<Vector3<f64>>,
    }

    impl ScriptedSource {
        fn new(samples: impl IntoIterator<Item = Vector3<f64>>) -> Self {
            Self {
                samples: samples.into_iter().collect(),
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn read_accelerometer(&mut self) -> Vector3<f64> {
            self.samples.pop_front().expect("script exhausted")
        }

        fn device_settings(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    /// Settings that make the collector run instantly against a script:
    /// no polling delay, one sample per capture window.
    fn scripted_settings(streak: u32) -> CollectorSettings {
        CollectorSettings {
            poll_interval: Duration::ZERO,
            stability_streak: streak,
            capture_duration: Duration::ZERO,
            extra_points: 0,
            ..Default::default()
        }
    }

    fn gate(axis: usize, polarity: Polarity, streak: u32) -> StabilityGate {
        StabilityGate::new(axis, polarity, &scripted_settings(streak))
    }

    #[test]
    fn test_gate_opens_after_full_streak() {
        let mut gate = gate(0, Polarity::Upward, 3);
        let sample = Vector3::new(1000.0, 10.0, -5.0);

        assert!(!gate.feed(&sample));
        assert!(!gate.feed(&sample));
        assert!(gate.feed(&sample));
    }

    #[test]
    fn test_gate_restarts_streak_on_break() {
        let mut gate = gate(0, Polarity::Upward, 3);
        let good = Vector3::new(1000.0, 10.0, -5.0);
        let tilted = Vector3::new(700.0, 700.0, 0.0);

        assert!(!gate.feed(&good));
        assert!(!gate.feed(&good));
        assert!(!gate.feed(&tilted));
        // The streak starts over.
        assert!(!gate.feed(&good));
        assert!(!gate.feed(&good));
        assert!(gate.feed(&good));
    }

    #[test]
    fn test_gate_rejects_wrong_sign() {
        let mut gate = gate(1, Polarity::Downward, 1);

        assert!(!gate.feed(&Vector3::new(0.0, 1000.0, 0.0)));
        assert!(gate.feed(&Vector3::new(0.0, -1000.0, 0.0)));
    }

    #[test]
    fn test_gate_treats_exact_zero_as_unstable() {
        // A zero component has no sign; a zero vector has no magnitude.
        // Neither counts towards the streak.
        let mut gate = gate(2, Polarity::Upward, 1);

        assert!(!gate.feed(&Vector3::new(0.0, 0.0, 0.0)));
        assert!(!gate.feed(&Vector3::new(1000.0, 0.0, 0.0)));
        assert!(gate.feed(&Vector3::new(0.0, 0.0, 1000.0)));
    }

    #[test]
    fn test_gate_magnitude_tolerance() {
        let mut gate = gate(0, Polarity::Upward, 1);

        // Off-axis contribution pushes the norm more than 5% above the
        // component under test.
        assert!(!gate.feed(&Vector3::new(1000.0, 500.0, 0.0)));
        // A mild off-axis reading stays within tolerance.
        assert!(gate.feed(&Vector3::new(1000.0, 100.0, 0.0)));
    }

    /// One pose's worth of script: enough stable samples to open the gate,
    /// plus one sample for the capture window.
    fn pose(sample: Vector3<f64>, streak: u32) -> Vec<Vector3<f64>> {
        vec![sample; streak as usize + 1]
    }

    #[test]
    fn test_six_point_zero_and_sensitivity() {
        let streak = 2;
        let script = [
            pose(Vector3::new(-800.0, 0.0, 1.0), streak), // x down
            pose(Vector3::new(1200.0, 0.0, 1.0), streak), // x up
            pose(Vector3::new(0.0, -1000.0, 1.0), streak), // y down
            pose(Vector3::new(0.0, 1000.0, 1.0), streak), // y up
            pose(Vector3::new(0.0, 1.0, -1000.0), streak), // z down
            pose(Vector3::new(0.0, 1.0, 1000.0), streak), // z up
        ]
        .concat();
        let mut source = ScriptedSource::new(script);

        let collected = PointCollector::new(scripted_settings(streak)).collect(&mut source);

        assert_eq!(collected.points.len(), 6);
        // max 1200, min -800
        assert!((collected.zero.x - 200.0).abs() < 1e-12);
        assert!((collected.sensitivity.x - 0.001).abs() < 1e-12);
        // max 1000, min -1000
        assert!((collected.zero.y - 0.0).abs() < 1e-12);
        assert!((collected.sensitivity.y - 0.002).abs() < 1e-12);
        assert!((collected.zero.z - 0.0).abs() < 1e-12);
        assert!((collected.sensitivity.z - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_collect_appends_extra_points() {
        let streak = 1;
        let mut script = [
            pose(Vector3::new(-1000.0, 0.0, 0.0), streak),
            pose(Vector3::new(1000.0, 0.0, 0.0), streak),
            pose(Vector3::new(0.0, -1000.0, 0.0), streak),
            pose(Vector3::new(0.0, 1000.0, 0.0), streak),
            pose(Vector3::new(0.0, 0.0, -1000.0), streak),
            pose(Vector3::new(0.0, 0.0, 1000.0), streak),
        ]
        .concat();
        // Extra poses are capture-only, no stability gating.
        script.push(Vector3::new(577.0, 577.0, 577.0));
        script.push(Vector3::new(-577.0, 577.0, -577.0));
        script.push(Vector3::new(577.0, -577.0, -577.0));
        let mut source = ScriptedSource::new(script);

        let settings = CollectorSettings {
            extra_points: 3,
            ..scripted_settings(streak)
        };
        let collected = PointCollector::new(settings).collect(&mut source);

        assert_eq!(collected.points.len(), 9);
        assert_eq!(collected.points[6], Vector3::new(577.0, 577.0, 577.0));
        assert_eq!(collected.points[8], Vector3::new(577.0, -577.0, -577.0));
    }

    #[test]
    fn test_gate_survives_noisy_settling() {
        // A device being moved into position: early samples break the
        // streak repeatedly before the pose settles.
        let streak = 3;
        let mut gate = gate(2, Polarity::Upward, streak);
        let noisy = [
            Vector3::new(400.0, 300.0, 600.0),
            Vector3::new(100.0, 50.0, 950.0),
            Vector3::new(90.0, 40.0, 980.0),
            Vector3::new(300.0, 200.0, 700.0),
        ];
        for sample in &noisy {
            assert!(!gate.feed(sample));
        }

        let settled = Vector3::new(10.0, 5.0, 1000.0);
        assert!(!gate.feed(&settled));
        assert!(!gate.feed(&settled));
        assert!(gate.feed(&settled));
    }
}
