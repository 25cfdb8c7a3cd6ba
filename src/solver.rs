//! Gauss-Newton estimation of the scale factor matrix and bias vector
//!
//! Fits the model `A = M(V - B)` to a set of static calibration points,
//! where `M` is a symmetric 3x3 scale/cross-axis matrix and `B` a bias
//! vector. Each static point measures gravity, so the fit drives
//! `‖M(V - B)‖` towards 1 for every point.
//!
//! The nine parameters (six independent matrix entries plus three bias
//! components) are found by damped Gauss-Newton iteration on the analytic
//! Jacobian of the per-point residual `‖M(B - V)‖² - 1`.

use log::debug;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::error::CalibrationError;
use crate::types::SolverSettings;

/// Minimum number of calibration points the solver accepts: six axis-aligned
/// poses plus three freely oriented ones.
pub const MIN_POINTS: usize = 9;

/// Sentinel residual norm; any first iteration compares favorably against it.
const INITIAL_RESIDUAL_NORM: f64 = 100_000.0;

/// The 9-element optimization parameter vector.
type ParamVector = SVector<f64, 9>;

/// Symmetric 3x3 scale factor matrix parameterized by its six independent
/// entries.
///
/// The entry order `[xx, xy, xz, yy, yz, zz]` is also the layout of the
/// first six optimization parameters, which keeps the Jacobian
/// column-to-parameter mapping unambiguous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricScale {
    /// X scale factor
    pub xx: f64,
    /// X/Y cross-axis factor
    pub xy: f64,
    /// X/Z cross-axis factor
    pub xz: f64,
    /// Y scale factor
    pub yy: f64,
    /// Y/Z cross-axis factor
    pub yz: f64,
    /// Z scale factor
    pub zz: f64,
}

impl SymmetricScale {
    /// Build from the first six optimization parameters.
    ///
    /// # Panics
    /// Panics if `params` holds fewer than six values.
    pub fn from_params(params: &[f64]) -> Self {
        Self {
            xx: params[0],
            xy: params[1],
            xz: params[2],
            yy: params[3],
            yz: params[4],
            zz: params[5],
        }
    }

    /// Expand into the full symmetric matrix.
    pub fn to_matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.xx, self.xy, self.xz, //
            self.xy, self.yy, self.yz, //
            self.xz, self.yz, self.zz,
        )
    }
}

/// Fit the scale factor matrix and bias vector to a set of static
/// calibration points.
///
/// The points must already be normalized to nominal unit-g scale, i.e.
/// `(raw - zero) * sensitivity` per axis. At least [`MIN_POINTS`] points
/// with sufficient angular diversity are required.
///
/// # Arguments
/// * `points` - Normalized static calibration points
/// * `settings` - Solver tuning parameters, usually [`SolverSettings::default`]
///
/// # Returns
/// The symmetric scale factor matrix and the bias vector.
///
/// # Errors
/// * [`CalibrationError::InsufficientData`] - fewer than [`MIN_POINTS`]
///   points, checked before any linear algebra
/// * [`CalibrationError::SingularSystem`] - the normal equations are not
///   solvable (degenerate point set)
/// * [`CalibrationError::NonConvergence`] - the iteration budget ran out
pub fn fit_scale_and_bias(
    points: &[Vector3<f64>],
    settings: &SolverSettings,
) -> Result<(Matrix3<f64>, Vector3<f64>), CalibrationError> {
    if points.len() < MIN_POINTS {
        return Err(CalibrationError::InsufficientData {
            got: points.len(),
            needed: MIN_POINTS,
        });
    }

    let mut state = OptimizationState::new(settings);
    let mut last_x = state.x;

    for iteration in 0..settings.max_iterations {
        let (m, b) = split_params(&state.x);

        // Accumulate JᵗJ, JᵗR and the residual norm in one pass over the
        // points.
        let mut jtj = SMatrix::<f64, 9, 9>::zeros();
        let mut jtr = ParamVector::zeros();
        let mut residual_norm_sq = 0.0;
        for point in points {
            let r = residual(&m, &b, point);
            let row = jacobian_row(&m, &b, point);
            jtj += row * row.transpose();
            jtr += row * r;
            residual_norm_sq += r * r;
        }

        let inverse = invert_normal_matrix(&jtj)?;
        state.x -= state.gain * (inverse * jtr);

        let residual_norm = residual_norm_sq.sqrt();
        debug!(
            "iteration {iteration}: residual norm {residual_norm:.9e}, gain {:.9e}",
            state.gain
        );

        // Shrink the gain gently while the error keeps falling; collapse it
        // when a step made things worse.
        if residual_norm <= state.prior_residual_norm {
            state.gain -= settings.damping * state.gain;
        } else {
            state.gain *= settings.damping;
        }

        if max_step_ratio(&state.x, &last_x) <= settings.tolerance {
            let (m, b) = split_params(&state.x);
            debug!("converged after {} iterations", iteration + 1);
            return Ok((m, b));
        }

        last_x = state.x;
        state.prior_residual_norm = residual_norm;
    }

    Err(CalibrationError::NonConvergence {
        iterations: settings.max_iterations,
    })
}

/// Per-run optimization state. Lives for exactly one call to
/// [`fit_scale_and_bias`] and is discarded afterwards, converged or not.
struct OptimizationState {
    /// Parameter vector `[Mxx, Mxy, Mxz, Myy, Myz, Mzz, Bx, By, Bz]`
    x: ParamVector,
    /// Adaptive step gain
    gain: f64,
    /// Residual norm of the previous iteration
    prior_residual_norm: f64,
}

impl OptimizationState {
    fn new(settings: &SolverSettings) -> Self {
        Self {
            x: ParamVector::from_column_slice(&settings.initial_guess),
            gain: settings.gain,
            prior_residual_norm: INITIAL_RESIDUAL_NORM,
        }
    }
}

/// Rebuild the matrix and bias from the current parameter vector.
fn split_params(x: &ParamVector) -> (Matrix3<f64>, Vector3<f64>) {
    let m = SymmetricScale::from_params(x.as_slice()).to_matrix();
    let b = Vector3::new(x[6], x[7], x[8]);
    (m, b)
}

/// Residual of one point against the unit-gravity constraint:
/// `‖M(B - V)‖² - 1`.
fn residual(m: &Matrix3<f64>, b: &Vector3<f64>, point: &Vector3<f64>) -> f64 {
    (m * (b - point)).norm_squared() - 1.0
}

/// One Jacobian row: the analytic partial derivatives of the residual with
/// respect to each of the nine parameters.
///
/// With `d = B - V` and `u = M·d`, the derivative with respect to a matrix
/// entry `Mij` is `2(uᵢdⱼ + uⱼdᵢ)` (halved on the diagonal), and the
/// derivative with respect to the bias is `2M·u` since `M` is symmetric.
fn jacobian_row(m: &Matrix3<f64>, b: &Vector3<f64>, point: &Vector3<f64>) -> ParamVector {
    let d = b - point;
    let u = m * d;
    let db = 2.0 * (m * u);
    ParamVector::from_column_slice(&[
        2.0 * u.x * d.x,
        2.0 * (u.x * d.y + u.y * d.x),
        2.0 * (u.x * d.z + u.z * d.x),
        2.0 * u.y * d.y,
        2.0 * (u.y * d.z + u.z * d.y),
        2.0 * u.z * d.z,
        db.x,
        db.y,
        db.z,
    ])
}

/// Invert the 9x9 normal equations matrix, surfacing degeneracy as
/// [`CalibrationError::SingularSystem`].
fn invert_normal_matrix(
    jtj: &SMatrix<f64, 9, 9>,
) -> Result<SMatrix<f64, 9, 9>, CalibrationError> {
    let inverse = jtj
        .try_inverse()
        .ok_or(CalibrationError::SingularSystem)?;
    // A rank-deficient point set can still produce a finite but meaningless
    // inverse; only accept it if it actually inverts the matrix.
    if !(jtj * inverse).is_identity(1e-6) {
        return Err(CalibrationError::SingularSystem);
    }
    Ok(inverse)
}

/// Largest relative parameter change across one iteration, the quantity the
/// convergence test compares against the tolerance.
fn max_step_ratio(new: &ParamVector, old: &ParamVector) -> f64 {
    let mut max = 0.0_f64;
    for i in 0..9 {
        max = max.max(step_ratio(new[i], old[i]));
    }
    max
}

/// Relative change `|2(new - old) / (new + old)|` of one parameter.
///
/// A zero denominator counts as converged only when both values are exactly
/// zero; otherwise the parameter is treated as not converged.
fn step_ratio(new: f64, old: f64) -> f64 {
    let sum = new + old;
    if sum == 0.0 {
        if new == 0.0 && old == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (2.0 * (new - old) / sum).abs()
    }
}
