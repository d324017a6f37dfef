//! Per-galaxy halo fits over a whole dataset.
//!
//! Each galaxy is an independent pure fit over a read-only slice of the
//! dataset, so we map in parallel and collect. Output order follows the
//! sorted galaxy ids, independent of thread scheduling.

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{Dataset, FitResult, SolverOptions};
use crate::error::AppError;
use crate::fit::halo::fit_burkert;

/// A galaxy whose halo fit failed, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaloFailure {
    pub galaxy: String,
    pub reason: String,
}

/// Outcome of fitting every galaxy in a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaloBatch {
    pub fits: Vec<FitResult>,
    pub failures: Vec<HaloFailure>,
}

/// Fit the Burkert profile to every galaxy in `dataset`.
///
/// Individual failures are collected, never abort the batch.
pub fn fit_all_halos(dataset: &Dataset, opts: &SolverOptions) -> HaloBatch {
    let ids: Vec<&str> = dataset.galaxy_ids().collect();

    let outcomes: Vec<(&str, Result<FitResult, AppError>)> = ids
        .par_iter()
        .map(|&id| (id, fit_burkert(dataset, id, opts)))
        .collect();

    let mut batch = HaloBatch::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(fit) => batch.fits.push(fit),
            Err(e) => {
                warn!("Halo fit skipped for {id}: {e}");
                batch.failures.push(HaloFailure {
                    galaxy: id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Burkert fits: {} succeeded, {} failed",
        batch.fits.len(),
        batch.failures.len()
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DerivedRecord, GalaxyRecord, KPC_TO_M};
    use crate::models::burkert_velocity;

    fn row(galaxy: &str, r_kpc: f64, rho0: f64, r0: f64) -> DerivedRecord {
        let v = burkert_velocity(r_kpc * KPC_TO_M, rho0, r0) / 1000.0;
        DerivedRecord::derive(GalaxyRecord {
            galaxy: galaxy.to_string(),
            distance_mpc: None,
            r_kpc,
            v_obs_kms: v,
            ev_obs_kms: None,
            v_gas_kms: 0.4 * v,
            v_disk_kms: 0.4 * v,
            v_bulge_kms: 0.0,
            sb_disk: None,
            sb_bulge: None,
        })
        .unwrap()
    }

    #[test]
    fn failures_are_collected_per_galaxy() {
        let mut rows = Vec::new();
        for r in 1..=6 {
            rows.push(row("B-good", r as f64, 2e-21, 7e19));
            rows.push(row("A-good", r as f64, 4e-21, 5e19));
        }
        rows.push(row("C-lonely", 3.0, 2e-21, 7e19));
        let ds = Dataset::from_records(rows);

        let batch = fit_all_halos(&ds, &SolverOptions::default());
        let fitted: Vec<&str> = batch.fits.iter().filter_map(|f| f.galaxy.as_deref()).collect();
        assert_eq!(fitted, vec!["A-good", "B-good"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].galaxy, "C-lonely");
        assert!(batch.failures[0].reason.contains("at least 2"));
    }
}
