//! Burkert halo fit engine: `(rho0, r0)` for one galaxy.
//!
//! The halo rotation velocity is fit directly against the observed rotation
//! curve with equal weights and no bounds. Radii and velocities are both SI
//! (metres, m/s), so `rho0` comes out in kg/m^3 and `r0` in metres.
//!
//! Physical plausibility (e.g. `rho0 > 0`) is not enforced here; callers that
//! care inspect the returned parameters.

use log::debug;
use nalgebra::DVector;

use crate::domain::{Dataset, DerivedRecord, FitResult, ModelKind, SolverOptions, Weighting};
use crate::error::AppError;
use crate::fit::summary::{build_result, not_converged};
use crate::math::least_squares;
use crate::models::burkert_velocity;

/// Initial central density guess (kg/m^3).
pub const RHO0_INITIAL: f64 = 1e-21;
/// Initial core radius guess (m), about 3.2 kpc.
pub const R0_INITIAL: f64 = 1e20;

/// Fit the Burkert profile to one galaxy of `dataset`.
pub fn fit_burkert(dataset: &Dataset, galaxy: &str, opts: &SolverOptions) -> Result<FitResult, AppError> {
    let rows = dataset.galaxy(galaxy)?;
    fit_burkert_rows(galaxy, &rows, opts)
}

/// Fit the Burkert profile to an explicit set of rows belonging to `galaxy`.
pub fn fit_burkert_rows(
    galaxy: &str,
    rows: &[&DerivedRecord],
    opts: &SolverOptions,
) -> Result<FitResult, AppError> {
    let required = ModelKind::Burkert.param_count();
    if rows.len() < required {
        return Err(AppError::InsufficientData {
            galaxy: galaxy.to_string(),
            points: rows.len(),
            required,
        });
    }

    let r_m: Vec<f64> = rows.iter().map(|r| r.r_m).collect();
    let v_obs: Vec<f64> = rows.iter().map(|r| r.v_obs_ms).collect();
    let n = rows.len();

    let residuals = |p: &DVector<f64>| {
        DVector::from_iterator(n, (0..n).map(|i| v_obs[i] - burkert_velocity(r_m[i], p[0], p[1])))
    };

    let report = least_squares(residuals, &[RHO0_INITIAL, R0_INITIAL], opts)
        .map_err(|f| not_converged(ModelKind::Burkert, Some(galaxy), f))?;

    debug!(
        "Burkert {galaxy}: rho0={:.3e} r0={:.3e} ({:?}, {} iteration(s))",
        report.x[0], report.x[1], report.termination, report.iterations
    );

    Ok(build_result(ModelKind::Burkert, Some(galaxy), Weighting::Uniform, &report))
}
