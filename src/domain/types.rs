//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for reporting or comparisons

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::units::{centripetal_acceleration, kms_to_ms, kpc_to_m, ms_to_kms};
use crate::models::{burkert_velocity, rar_g_obs};

/// One observation of a galaxy rotation curve, after column resolution and
/// numeric coercion. Velocities are km/s, radius is kpc.
#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyRecord {
    pub galaxy: String,
    /// Assumed distance (Mpc), carried through when the catalog has it.
    pub distance_mpc: Option<f64>,
    pub r_kpc: f64,
    pub v_obs_kms: f64,
    /// Uncertainty on `v_obs_kms`; `None` when the column is absent or the cell is blank.
    pub ev_obs_kms: Option<f64>,
    /// Baryonic components. A component whose column is absent from the
    /// catalog is stored as `0.0`.
    pub v_gas_kms: f64,
    pub v_disk_kms: f64,
    pub v_bulge_kms: f64,
    pub sb_disk: Option<f64>,
    pub sb_bulge: Option<f64>,
}

/// A `GalaxyRecord` plus the SI quantities the fit engines consume.
///
/// Every `f64` field is finite and `g_obs`, `g_bar`, `r_m` are strictly
/// positive; construction through [`DerivedRecord::derive`] enforces it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub record: GalaxyRecord,
    pub v_bar_kms: f64,
    pub r_m: f64,
    pub v_obs_ms: f64,
    pub v_bar_ms: f64,
    /// Observed centripetal acceleration (m/s^2).
    pub g_obs: f64,
    /// Baryonic centripetal acceleration (m/s^2).
    pub g_bar: f64,
    /// First-order propagated uncertainty on `g_obs`; `None` when `ev_obs_kms`
    /// is unknown or the propagation is non-finite.
    pub g_obs_err: Option<f64>,
}

impl DerivedRecord {
    /// Compute derived fields, rejecting rows with any non-finite or
    /// non-positive quantity the fits depend on.
    pub fn derive(record: GalaxyRecord) -> Result<Self, String> {
        let v_bar_kms = (record.v_gas_kms.powi(2)
            + record.v_disk_kms.powi(2)
            + record.v_bulge_kms.powi(2))
        .sqrt();

        let r_m = kpc_to_m(record.r_kpc);
        let v_obs_ms = kms_to_ms(record.v_obs_kms);
        let v_bar_ms = kms_to_ms(v_bar_kms);
        let g_obs = centripetal_acceleration(v_obs_ms, r_m);
        let g_bar = centripetal_acceleration(v_bar_ms, r_m);

        let g_obs_err = record
            .ev_obs_kms
            .map(|ev| 2.0 * v_obs_ms * kms_to_ms(ev) / r_m)
            .filter(|e| e.is_finite());

        if !(record.r_kpc.is_finite() && record.r_kpc > 0.0) {
            return Err(format!("Radius must be finite and > 0 (got {}).", record.r_kpc));
        }
        if !record.v_obs_kms.is_finite() {
            return Err("Non-finite observed velocity.".to_string());
        }
        if !v_bar_kms.is_finite() {
            return Err("Non-finite baryonic velocity.".to_string());
        }
        if !(g_obs.is_finite() && g_obs > 0.0) {
            return Err(format!("g_obs must be finite and > 0 (got {g_obs:e})."));
        }
        if !(g_bar.is_finite() && g_bar > 0.0) {
            return Err(format!("g_bar must be finite and > 0 (got {g_bar:e})."));
        }

        Ok(Self {
            record,
            v_bar_kms,
            r_m,
            v_obs_ms,
            v_bar_ms,
            g_obs,
            g_bar,
            g_obs_err,
        })
    }

    pub fn galaxy(&self) -> &str {
        &self.record.galaxy
    }

    /// Relative velocity error `σV_obs / V_obs`, when known.
    pub fn relative_error(&self) -> Option<f64> {
        let ev = self.record.ev_obs_kms?;
        let rel = ev / self.record.v_obs_kms.abs();
        rel.is_finite().then_some(rel)
    }
}

/// Concrete fitted model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Radial Acceleration Relation, one global scale `g0`.
    Rar,
    /// Burkert cored halo, per galaxy `(rho0, r0)`.
    Burkert,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Rar => "RAR",
            ModelKind::Burkert => "Burkert",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Rar => &["g0"],
            ModelKind::Burkert => &["rho0", "r0"],
        }
    }

    pub fn param_count(self) -> usize {
        self.param_names().len()
    }
}

/// How the RAR residuals were weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weighting {
    /// Per-row propagated `g_obs_err`, used as given.
    Reported,
    /// Dataset-wide fallback `max(0.1 * g_obs, 1e-12)`.
    RelativeFloor,
    /// Equal weights (Burkert fits).
    Uniform,
}

/// Why the solver stopped after reaching a stationary point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// Scaled gradient fell below `gtol`.
    Gradient,
    /// Relative cost reduction fell below `ftol`.
    CostReduction,
    /// Scaled step fell below `xtol`.
    StepSize,
    /// Residuals vanished exactly.
    ZeroResidual,
}

/// Solver bookkeeping for a single fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSummary {
    pub converged: bool,
    pub termination: Termination,
    pub iterations: usize,
    pub evaluations: usize,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    /// Sum of squared (weighted) residuals at the optimum.
    pub sse: f64,
    pub rmse: f64,
    /// `sse / (n - k)`, absent when the fit has no spare degrees of freedom.
    pub reduced_chi2: Option<f64>,
}

/// Fit output for a single model call. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    /// Galaxy the fit belongs to (`None` for dataset-wide fits).
    pub galaxy: Option<String>,
    /// Parameters in `model.param_names()` order, SI units.
    pub params: Vec<f64>,
    /// Parameter covariance from the solver's linearization, scaled by the
    /// residual variance.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub weighting: Weighting,
    pub quality: FitQuality,
    pub solver: SolverSummary,
}

impl FitResult {
    pub fn param(&self, name: &str) -> Option<f64> {
        let idx = self.model.param_names().iter().position(|n| *n == name)?;
        self.params.get(idx).copied()
    }

    /// One-sigma parameter uncertainties (sqrt of the covariance diagonal).
    pub fn std_errors(&self) -> Option<Vec<f64>> {
        let cov = self.covariance.as_ref()?;
        Some(
            cov.iter()
                .enumerate()
                .map(|(i, row)| row.get(i).copied().unwrap_or(f64::NAN).max(0.0).sqrt())
                .collect(),
        )
    }

    /// Evaluate the fitted model.
    ///
    /// - RAR: `x` is `g_bar` (m/s^2), returns predicted `g_obs` (m/s^2).
    /// - Burkert: `x` is radius (kpc), returns halo velocity (km/s).
    pub fn predict(&self, x: f64) -> f64 {
        match self.model {
            ModelKind::Rar => rar_g_obs(x, self.params[0]),
            ModelKind::Burkert => ms_to_kms(burkert_velocity(kpc_to_m(x), self.params[0], self.params[1])),
        }
    }
}

/// Levenberg–Marquardt stopping rules shared by both fit engines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Budget of residual evaluations spent on trial steps.
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus `.env` and defaults).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub csv_path: PathBuf,
    /// Drop rows with `σV/V >= threshold` before fitting.
    pub max_rel_error: Option<f64>,
    pub solver: SolverOptions,
    /// Galaxies listed on each side of the RAR offset ranking.
    pub top_n: usize,
    pub export_dataset: Option<PathBuf>,
    pub export_fits: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(r_kpc: f64, v_obs: f64, ev: Option<f64>, v_gas: f64, v_disk: f64, v_bul: f64) -> GalaxyRecord {
        GalaxyRecord {
            galaxy: "G".to_string(),
            distance_mpc: None,
            r_kpc,
            v_obs_kms: v_obs,
            ev_obs_kms: ev,
            v_gas_kms: v_gas,
            v_disk_kms: v_disk,
            v_bulge_kms: v_bul,
            sb_disk: None,
            sb_bulge: None,
        }
    }

    #[test]
    fn derive_computes_quadrature_and_accelerations() {
        let d = DerivedRecord::derive(record(2.0, 100.0, Some(5.0), 30.0, 40.0, 0.0)).unwrap();
        assert!((d.v_bar_kms - 50.0).abs() < 1e-12);

        let r_m = 2.0 * crate::domain::KPC_TO_M;
        assert!((d.r_m - r_m).abs() / r_m < 1e-15);
        let g_obs = (100.0e3_f64).powi(2) / r_m;
        let g_bar = (50.0e3_f64).powi(2) / r_m;
        assert!(((d.g_obs - g_obs) / g_obs).abs() < 1e-12);
        assert!(((d.g_bar - g_bar) / g_bar).abs() < 1e-12);

        let err = 2.0 * 100.0e3 * 5.0e3 / r_m;
        assert!(((d.g_obs_err.unwrap() - err) / err).abs() < 1e-12);
    }

    #[test]
    fn derive_rejects_zero_baryonic_velocity() {
        let err = DerivedRecord::derive(record(1.0, 50.0, None, 0.0, 0.0, 0.0)).unwrap_err();
        assert!(err.contains("g_bar"), "{err}");
    }

    #[test]
    fn derive_rejects_non_positive_radius() {
        assert!(DerivedRecord::derive(record(0.0, 50.0, None, 10.0, 0.0, 0.0)).is_err());
        assert!(DerivedRecord::derive(record(-1.0, 50.0, None, 10.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn unknown_uncertainty_is_none_not_nan() {
        let d = DerivedRecord::derive(record(3.0, 80.0, None, 20.0, 10.0, 0.0)).unwrap();
        assert!(d.g_obs_err.is_none());
        assert!(d.relative_error().is_none());
    }

    #[test]
    fn param_lookup_by_name() {
        let fit = FitResult {
            model: ModelKind::Burkert,
            galaxy: Some("G".to_string()),
            params: vec![1e-21, 1e20],
            covariance: Some(vec![vec![4e-44, 0.0], vec![0.0, 9e38]]),
            weighting: Weighting::Uniform,
            quality: FitQuality {
                n: 5,
                sse: 0.0,
                rmse: 0.0,
                reduced_chi2: Some(0.0),
            },
            solver: SolverSummary {
                converged: true,
                termination: Termination::StepSize,
                iterations: 3,
                evaluations: 10,
            },
        };
        assert_eq!(fit.param("r0"), Some(1e20));
        assert_eq!(fit.param("g0"), None);
        let se = fit.std_errors().unwrap();
        assert!((se[0] - 2e-22).abs() < 1e-30);
        assert!((se[1] - 3e19).abs() < 1e5);
    }
}
