//! Error taxonomy for the calibration engine

use thiserror::Error;

/// Failures surfaced by the calibration engine.
///
/// Every variant is terminal for the calibration attempt in progress. The
/// engine never retries on its own; the caller decides whether to restart
/// the whole procedure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// Calibration was invoked on a model that already holds parameters.
    ///
    /// Calibration is single-shot; the existing parameters are left
    /// untouched. Loading a stored document is the one supported
    /// overwrite path.
    #[error("model has already been calibrated")]
    AlreadyCalibrated,

    /// Fewer calibration points than the solver minimum were available.
    #[error("need at least {needed} calibration points, got {got}")]
    InsufficientData {
        /// Number of points actually available
        got: usize,
        /// Solver minimum (six axis-aligned poses plus three free ones)
        needed: usize,
    },

    /// The normal equations could not be solved, typically because the
    /// calibration points lack angular diversity (identical or colinear
    /// poses).
    #[error("singular normal equations; calibration points are degenerate")]
    SingularSystem,

    /// The iteration budget ran out before the convergence criterion was
    /// met. No parameters are produced.
    #[error("no convergence after {iterations} iterations")]
    NonConvergence {
        /// Iteration budget that was exhausted
        iterations: u32,
    },

    /// A transform was requested from a model with no parameters.
    #[error("model has not been calibrated")]
    NotCalibrated,
}
