//! Long-lived calibration parameters and the runtime transform

use log::info;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::collector::PointCollector;
use crate::error::CalibrationError;
use crate::solver;
use crate::source::SampleSource;
use crate::types::{CollectorSettings, SolverSettings};

/// Accelerometer calibration parameters.
///
/// Immutable once produced by a calibration run. The zero offset and
/// sensitivity come from the six-point pass; the scale factor matrix and
/// bias vector come from the Gauss-Newton fit.
#[derive(Debug, Clone, PartialEq)]
pub struct AccelParameters {
    /// Per-axis raw reading corresponding to 0 g
    pub zero: Vector3<f64>,
    /// Per-axis conversion from raw units to nominal g
    pub sensitivity: Vector3<f64>,
    /// Symmetric scale and cross-axis correction matrix
    pub scale_factor: Matrix3<f64>,
    /// Residual offset in normalized units, applied after zero and
    /// sensitivity
    pub bias: Vector3<f64>,
}

/// Holder of calibration results and the transform applied to live
/// readings.
///
/// A model starts empty and is populated exactly once by a successful
/// calibration run, or by loading a previously stored document. Readers
/// borrow it; nothing mutates a populated model.
#[derive(Debug, Clone, Default)]
pub struct CalibrationModel {
    device_settings: serde_json::Value,
    accelerometer: Option<AccelParameters>,
}

impl CalibrationModel {
    /// Create an empty, uncalibrated model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the model holds accelerometer parameters.
    pub fn is_calibrated(&self) -> bool {
        self.accelerometer.is_some()
    }

    /// The accelerometer parameters, if the model is populated.
    pub fn accelerometer(&self) -> Option<&AccelParameters> {
        self.accelerometer.as_ref()
    }

    /// Device configuration captured when the model was calibrated.
    pub fn device_settings(&self) -> &serde_json::Value {
        &self.device_settings
    }

    /// Run the full accelerometer calibration procedure against a sample
    /// source.
    ///
    /// Collects the six axis-aligned poses and the configured extra poses,
    /// normalizes them with the derived zero offset and sensitivity, and
    /// fits the scale factor matrix and bias vector. Blocks until the
    /// operator has worked through every pose.
    ///
    /// Calibration is single-shot: a populated model refuses to
    /// recalibrate and keeps its parameters. On any failure the model is
    /// left empty; partially converged parameters are never kept.
    ///
    /// # Errors
    /// * [`CalibrationError::AlreadyCalibrated`] - the model already holds
    ///   parameters
    /// * [`CalibrationError::InsufficientData`] - fewer than nine points
    ///   were collected
    /// * [`CalibrationError::SingularSystem`] - the collected poses were
    ///   degenerate
    /// * [`CalibrationError::NonConvergence`] - the solver ran out of
    ///   iterations
    pub fn calibrate_accelerometer<S: SampleSource>(
        &mut self,
        source: &mut S,
        collector_settings: CollectorSettings,
        solver_settings: SolverSettings,
    ) -> Result<(), CalibrationError> {
        if self.accelerometer.is_some() {
            return Err(CalibrationError::AlreadyCalibrated);
        }

        let device_settings = source.device_settings();
        let collected = PointCollector::new(collector_settings).collect(source);

        let normalized: Vec<Vector3<f64>> = collected
            .points
            .iter()
            .map(|point| (point - collected.zero).component_mul(&collected.sensitivity))
            .collect();

        let (scale_factor, bias) = solver::fit_scale_and_bias(&normalized, &solver_settings)?;
        info!("accelerometer calibration complete over {} points", normalized.len());

        self.device_settings = device_settings;
        self.accelerometer = Some(AccelParameters {
            zero: collected.zero,
            sensitivity: collected.sensitivity,
            scale_factor,
            bias,
        });
        Ok(())
    }

    /// Convert one raw accelerometer reading to units of g:
    /// `M · ((raw - zero) ∘ sensitivity - B)`.
    ///
    /// # Errors
    /// [`CalibrationError::NotCalibrated`] if the model is empty.
    pub fn transform_accelerometer(
        &self,
        raw: Vector3<f64>,
    ) -> Result<Vector3<f64>, CalibrationError> {
        let params = self
            .accelerometer
            .as_ref()
            .ok_or(CalibrationError::NotCalibrated)?;
        let normalized = (raw - params.zero).component_mul(&params.sensitivity);
        Ok(params.scale_factor * (normalized - params.bias))
    }

    /// Serialize the model into its storage form.
    ///
    /// The version tag is supplied by the caller; the engine stamps
    /// nothing of its own.
    ///
    /// # Errors
    /// [`CalibrationError::NotCalibrated`] if the model is empty.
    pub fn to_document(&self, version: &str) -> Result<CalibrationDocument, CalibrationError> {
        let params = self
            .accelerometer
            .as_ref()
            .ok_or(CalibrationError::NotCalibrated)?;
        let m = &params.scale_factor;

        Ok(CalibrationDocument {
            version: version.to_owned(),
            device_settings: self.device_settings.clone(),
            accelerometer: AccelDocument {
                zero: params.zero.into(),
                sensitivity: params.sensitivity.into(),
                scale_factor: [
                    m[(0, 0)],
                    m[(0, 1)],
                    m[(0, 2)],
                    m[(1, 0)],
                    m[(1, 1)],
                    m[(1, 2)],
                    m[(2, 0)],
                    m[(2, 1)],
                    m[(2, 2)],
                ],
                bias: params.bias.into(),
            },
        })
    }

    /// Rebuild a model from its storage form. This is the one supported
    /// way to overwrite existing parameters.
    pub fn from_document(doc: &CalibrationDocument) -> Self {
        let acc = &doc.accelerometer;
        Self {
            device_settings: doc.device_settings.clone(),
            accelerometer: Some(AccelParameters {
                zero: Vector3::from(acc.zero),
                sensitivity: Vector3::from(acc.sensitivity),
                scale_factor: Matrix3::from_row_slice(&acc.scale_factor),
                bias: Vector3::from(acc.bias),
            }),
        }
    }
}

/// Storage form of a calibration run.
///
/// The field layout is the persistence contract with the surrounding
/// driver: round-tripping a model through it is lossless. How and where
/// the document is written is the driver's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    /// Caller-supplied version tag, stored verbatim
    pub version: String,
    /// Opaque device configuration captured at calibration time
    pub device_settings: serde_json::Value,
    /// Accelerometer parameter block
    pub accelerometer: AccelDocument,
}

/// Accelerometer block of the stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelDocument {
    /// Per-axis zero offset
    pub zero: [f64; 3],
    /// Per-axis sensitivity
    pub sensitivity: [f64; 3],
    /// Scale factor matrix in row-major order
    pub scale_factor: [f64; 9],
    /// Bias vector
    pub bias: [f64; 3],
}
