//! RAR fit engine: the global acceleration scale `g0`.
//!
//! Minimizes `sum(((g_obs - g_rar(g_bar; g0)) / w)^2)` over `g0` inside the box
//! `[G0_LOWER, G0_UPPER]`, starting at `G0_INITIAL`. The box is part of the
//! model: the relation is undefined for `g0 <= 0`.
//!
//! Weighting is decided once for the whole working subset:
//! - if no row carries a usable (present, non-zero) `g_obs_err`, every row gets
//!   `max(0.1 * g_obs, 1e-12)`
//! - otherwise each row's `g_obs_err` is used as is, including rows whose
//!   uncertainty is unknown (NaN). Such rows make the residuals non-finite and
//!   the fit fails loudly rather than quietly reweighting them.

use log::{debug, info};
use nalgebra::DVector;

use crate::domain::{Dataset, DerivedRecord, FitResult, ModelKind, SolverOptions, Weighting};
use crate::error::AppError;
use crate::fit::summary::{build_result, not_converged};
use crate::math::{Bounds, least_squares_bounded};
use crate::models::rar_g_obs;

pub const G0_INITIAL: f64 = 1e-10;
pub const G0_LOWER: f64 = 1e-16;
pub const G0_UPPER: f64 = 1e-5;

const FALLBACK_REL_ERROR: f64 = 0.1;
const FALLBACK_FLOOR: f64 = 1e-12;

/// Label used in errors for the dataset-wide fit.
const DATASET_LABEL: &str = "(all galaxies)";

/// Rows eligible for the RAR fit: both accelerations finite and positive.
pub fn rar_rows(dataset: &Dataset) -> Vec<&DerivedRecord> {
    dataset
        .iter()
        .filter(|r| r.g_bar.is_finite() && r.g_bar > 0.0 && r.g_obs.is_finite() && r.g_obs > 0.0)
        .collect()
}

/// Per-row residual weights and the policy that produced them.
pub fn rar_weights(rows: &[&DerivedRecord]) -> (Vec<f64>, Weighting) {
    let column_usable = rows.iter().any(|r| r.g_obs_err.is_some_and(|e| e != 0.0));

    if column_usable {
        let w = rows.iter().map(|r| r.g_obs_err.unwrap_or(f64::NAN)).collect();
        (w, Weighting::Reported)
    } else {
        let w = rows
            .iter()
            .map(|r| (FALLBACK_REL_ERROR * r.g_obs).max(FALLBACK_FLOOR))
            .collect();
        (w, Weighting::RelativeFloor)
    }
}

/// Fit `g0` against every eligible row of `dataset`.
pub fn fit_rar(dataset: &Dataset, opts: &SolverOptions) -> Result<FitResult, AppError> {
    let rows = rar_rows(dataset);
    if rows.len() < ModelKind::Rar.param_count() {
        return Err(AppError::InsufficientData {
            galaxy: DATASET_LABEL.to_string(),
            points: rows.len(),
            required: ModelKind::Rar.param_count(),
        });
    }

    let (weights, weighting) = rar_weights(&rows);
    info!("RAR fit: {} point(s), weighting={weighting:?}", rows.len());

    let g_bar: Vec<f64> = rows.iter().map(|r| r.g_bar).collect();
    let g_obs: Vec<f64> = rows.iter().map(|r| r.g_obs).collect();
    let n = rows.len();

    let residuals = |p: &DVector<f64>| {
        DVector::from_iterator(
            n,
            (0..n).map(|i| (g_obs[i] - rar_g_obs(g_bar[i], p[0])) / weights[i]),
        )
    };

    let bounds = Bounds::new(&[G0_LOWER], &[G0_UPPER]);
    let report = least_squares_bounded(residuals, &[G0_INITIAL], &bounds, opts)
        .map_err(|f| not_converged(ModelKind::Rar, None, f))?;

    debug!(
        "RAR solver: {:?} after {} iteration(s), {} evaluation(s)",
        report.termination, report.iterations, report.evaluations
    );

    let fit = build_result(ModelKind::Rar, None, weighting, &report);
    info!("RAR best-fit g0 = {:.3e} m/s^2", fit.params[0]);
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GalaxyRecord, KPC_TO_M};

    /// Build a row whose accelerations sit exactly on the RAR at `g0`.
    fn rar_row(galaxy: &str, r_kpc: f64, g_bar: f64, g0: f64, rel_ev: Option<f64>) -> DerivedRecord {
        let r_m = r_kpc * KPC_TO_M;
        let v_bar = (g_bar * r_m).sqrt() / 1000.0;
        let v_obs = (rar_g_obs(g_bar, g0) * r_m).sqrt() / 1000.0;
        DerivedRecord::derive(GalaxyRecord {
            galaxy: galaxy.to_string(),
            distance_mpc: None,
            r_kpc,
            v_obs_kms: v_obs,
            ev_obs_kms: rel_ev.map(|e| e * v_obs),
            v_gas_kms: 0.0,
            v_disk_kms: v_bar,
            v_bulge_kms: 0.0,
            sb_disk: None,
            sb_bulge: None,
        })
        .unwrap()
    }

    fn synthetic(g0: f64, rel_ev: Option<f64>) -> Dataset {
        let mut rows = Vec::new();
        for i in 0..40 {
            // g_bar log-spaced over 1e-12 .. 1e-9
            let g_bar = 10f64.powf(-12.0 + 3.0 * i as f64 / 39.0);
            rows.push(rar_row(&format!("G{}", i % 4), 1.0 + i as f64 * 0.5, g_bar, g0, rel_ev));
        }
        Dataset::from_records(rows)
    }

    #[test]
    fn recovers_known_g0_with_fallback_weights() {
        let ds = synthetic(1.2e-10, None);
        let fit = fit_rar(&ds, &SolverOptions::default()).unwrap();
        let g0 = fit.params[0];
        assert!(((g0 - 1.2e-10) / 1.2e-10).abs() < 0.01, "g0 = {g0:e}");
        assert_eq!(fit.weighting, Weighting::RelativeFloor);
        assert!(fit.solver.converged);
    }

    #[test]
    fn recovers_known_g0_with_reported_errors() {
        let ds = synthetic(1.2e-10, Some(0.05));
        let fit = fit_rar(&ds, &SolverOptions::default()).unwrap();
        let g0 = fit.params[0];
        assert!(((g0 - 1.2e-10) / 1.2e-10).abs() < 0.01, "g0 = {g0:e}");
        assert_eq!(fit.weighting, Weighting::Reported);
        assert!(fit.covariance.is_some());
    }

    #[test]
    fn all_zero_uncertainty_triggers_fallback_weights() {
        let ds = synthetic(1.2e-10, Some(0.0));
        let rows = rar_rows(&ds);
        let (w, weighting) = rar_weights(&rows);
        assert_eq!(weighting, Weighting::RelativeFloor);
        for (wi, r) in w.iter().zip(&rows) {
            assert_eq!(*wi, (0.1 * r.g_obs).max(1e-12));
        }
    }

    #[test]
    fn realistic_uncertainty_does_not_trigger_fallback() {
        let ds = synthetic(1.2e-10, Some(0.05));
        let rows = rar_rows(&ds);
        let (w, weighting) = rar_weights(&rows);
        assert_eq!(weighting, Weighting::Reported);
        for (wi, r) in w.iter().zip(&rows) {
            assert_eq!(Some(*wi), r.g_obs_err);
        }
    }

    #[test]
    fn fallback_floor_applies_to_tiny_accelerations() {
        let mut row = rar_row("G", 1.0, 1e-12, 1.2e-10, None);
        row.g_obs = 1e-12;
        let (w, _) = rar_weights(&[&row]);
        assert_eq!(w[0], 1e-12);
    }

    #[test]
    fn partially_missing_uncertainty_is_used_row_by_row() {
        let mut rows: Vec<DerivedRecord> = (0..6)
            .map(|i| rar_row("G", 1.0 + i as f64, 10f64.powf(-11.0 + 0.3 * i as f64), 1.2e-10, Some(0.05)))
            .collect();
        rows[2].g_obs_err = None;
        let ds = Dataset::from_records(rows);

        let (w, weighting) = rar_weights(&rar_rows(&ds));
        assert_eq!(weighting, Weighting::Reported);
        assert!(w[2].is_nan());

        match fit_rar(&ds, &SolverOptions::default()) {
            Err(AppError::DidNotConverge { model, galaxy, .. }) => {
                assert_eq!(model, ModelKind::Rar);
                assert!(galaxy.is_none());
            }
            other => panic!("expected DidNotConverge, got {other:?}"),
        }
    }

    #[test]
    fn g0_stays_inside_the_box() {
        // g_obs = 1000 g_bar needs g0 ~ 1e-4, beyond the upper bound.
        let rows: Vec<DerivedRecord> = (0..10)
            .map(|i| {
                let mut r = rar_row("G", 1.0 + i as f64, 1e-10 * (1.0 + i as f64), 1.2e-10, None);
                r.g_obs = 1000.0 * r.g_bar;
                r
            })
            .collect();
        let ds = Dataset::from_records(rows);

        let fit = fit_rar(&ds, &SolverOptions::default()).unwrap();
        let g0 = fit.params[0];
        assert!((G0_LOWER..=G0_UPPER).contains(&g0), "g0 = {g0:e}");
        assert_eq!(g0, G0_UPPER);
    }

    #[test]
    fn empty_dataset_is_insufficient() {
        let err = fit_rar(&Dataset::default(), &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientData { points: 0, .. }));
    }
}
