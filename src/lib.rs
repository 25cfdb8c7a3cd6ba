//! Accelerometer calibration from static gravity poses.
//!
//! In static conditions the magnitude of the accelerometer output matches
//! gravity. This crate exploits that to estimate a full calibration for a
//! MEMS accelerometer: per-axis zero offset and sensitivity from six
//! axis-aligned ±1g poses, then a symmetric 3x3 scale factor matrix `M`
//! and bias vector `B` fitted by damped Gauss-Newton iteration so that
//! `‖M(V - B)‖ = 1` across all recorded poses. The diagonal of `M` carries
//! the per-axis scale factors; the off-diagonal entries describe axis
//! misalignment and channel crosstalk.
//!
//! Calibrated readings in units of g are then
//! `M · ((raw - zero) ∘ sensitivity - B)`.
//!
//! # Features
//!
//! - Six-point ±1g collection protocol with a debounced stability gate
//! - Gauss-Newton solver with analytic Jacobian and adaptive step damping
//! - Distinct, terminal error conditions (no silent fallbacks)
//! - Lossless serde document form for storing calibration results
//! - Hardware abstracted behind a [`SampleSource`] trait, so the whole
//!   procedure runs against scripted samples in tests
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::{Matrix3, Vector3};
//! use accel_cal::{SolverSettings, fit_scale_and_bias};
//!
//! // Nine static poses of an ideal sensor, already normalized to unit-g
//! // scale: six axis-aligned plus three tilted.
//! let f = 1.0 / 3.0_f64.sqrt();
//! let points = vec![
//!     Vector3::new(1.0, 0.0, 0.0),
//!     Vector3::new(-1.0, 0.0, 0.0),
//!     Vector3::new(0.0, 1.0, 0.0),
//!     Vector3::new(0.0, -1.0, 0.0),
//!     Vector3::new(0.0, 0.0, 1.0),
//!     Vector3::new(0.0, 0.0, -1.0),
//!     Vector3::new(f, f, f),
//!     Vector3::new(-f, f, -f),
//!     Vector3::new(f, -f, -f),
//! ];
//!
//! let (scale_factor, bias) = fit_scale_and_bias(&points, &SolverSettings::default())?;
//!
//! // An ideal sensor needs no correction.
//! assert!((scale_factor - Matrix3::identity()).norm() < 1e-4);
//! assert!(bias.norm() < 1e-4);
//! # Ok::<(), accel_cal::CalibrationError>(())
//! ```
//!
//! Driving a real device goes through [`CalibrationModel`]: implement
//! [`SampleSource`] for the hardware driver, call
//! [`CalibrationModel::calibrate_accelerometer`], and keep the populated
//! model around to transform live readings.

pub mod collector;
mod error;
mod model;
pub mod solver;
mod source;
mod types;

// Re-export all public types and functions
pub use collector::{CollectedPoints, PointCollector, Polarity, StabilityGate};
pub use error::CalibrationError;
pub use model::{AccelDocument, AccelParameters, CalibrationDocument, CalibrationModel};
pub use solver::{MIN_POINTS, SymmetricScale, fit_scale_and_bias};
pub use source::SampleSource;
pub use types::{CollectorSettings, SolverSettings};
