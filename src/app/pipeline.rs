//! Shared "fit pipeline" logic used by every command.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> optional error filter -> RAR fit -> batch halo fits -> offsets -> report
//!
//! The commands can then focus on presentation and exports.

use chrono::Utc;
use log::{info, warn};

use crate::domain::{Dataset, FitResult, PipelineConfig};
use crate::error::AppError;
use crate::fit::{HaloBatch, fit_all_halos, fit_rar};
use crate::io::{FitReport, IngestedData, load_dataset};
use crate::report::{GalaxyOffset, Rankings, rank_offsets, rar_offsets};

/// All computed outputs of a single `rar fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    /// The dataset the fits actually saw (after the optional error filter).
    pub dataset: Dataset,
    pub rar: Option<FitResult>,
    pub halos: HaloBatch,
    pub offsets: Vec<GalaxyOffset>,
    pub rankings: Rankings,
    pub report: FitReport,
}

/// Load the catalog named by `config` and apply the optional error filter.
pub fn load_working_dataset(config: &PipelineConfig) -> Result<(IngestedData, Dataset), AppError> {
    let ingest = load_dataset(&config.csv_path)?;
    let dataset = apply_filter(&ingest, config)?;
    Ok((ingest, dataset))
}

fn apply_filter(ingest: &IngestedData, config: &PipelineConfig) -> Result<Dataset, AppError> {
    let Some(threshold) = config.max_rel_error else {
        return Ok(ingest.dataset.clone());
    };
    let filtered = ingest.dataset.filter_relative_error(threshold);
    info!(
        "Relative-error filter (< {threshold}): kept {} of {} point(s)",
        filtered.len(),
        ingest.dataset.len()
    );
    if filtered.is_empty() {
        return Err(AppError::EmptyDataset {
            rows_read: ingest.rows_read,
        });
    }
    Ok(filtered)
}

/// Execute the full pipeline against the catalog on disk.
pub fn run_fit(config: &PipelineConfig) -> Result<RunOutput, AppError> {
    let ingest = load_dataset(&config.csv_path)?;
    run_fit_with_ingest(config, ingest)
}

/// Execute the pipeline on an already-loaded catalog.
///
/// A failed RAR fit is recorded in the report rather than aborting the run;
/// the halo fits do not depend on it.
pub fn run_fit_with_ingest(config: &PipelineConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let dataset = apply_filter(&ingest, config)?;

    let (rar, rar_error) = match fit_rar(&dataset, &config.solver) {
        Ok(fit) => (Some(fit), None),
        Err(e) => {
            warn!("{e}");
            (None, Some(e.to_string()))
        }
    };

    let halos = fit_all_halos(&dataset, &config.solver);

    let offsets = match &rar {
        Some(fit) => rar_offsets(&dataset, fit)?,
        None => Vec::new(),
    };
    let rankings = rank_offsets(&offsets, config.top_n);

    let report = FitReport {
        tool: "rar".to_string(),
        generated_at: Utc::now(),
        source: config.csv_path.display().to_string(),
        rows_read: ingest.rows_read,
        rows_used: dataset.len(),
        stats: dataset.stats(),
        rar: rar.clone(),
        rar_error,
        halos: halos.clone(),
    };

    Ok(RunOutput {
        ingest,
        dataset,
        rar,
        halos,
        offsets,
        rankings,
        report,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::{SyntheticSpec, generate_catalog, write_catalog};
    use crate::domain::SolverOptions;
    use crate::io::load_from_str;

    fn config(max_rel_error: Option<f64>) -> PipelineConfig {
        PipelineConfig {
            csv_path: PathBuf::from("synthetic.csv"),
            max_rel_error,
            solver: SolverOptions::default(),
            top_n: 3,
            export_dataset: None,
            export_fits: None,
            report_path: None,
        }
    }

    fn synthetic_ingest(noise: f64) -> IngestedData {
        let spec = SyntheticSpec {
            galaxies: 5,
            points_per_galaxy: 10,
            noise,
            ..SyntheticSpec::default()
        };
        let mut buf = Vec::new();
        write_catalog(&mut buf, &generate_catalog(&spec).unwrap()).unwrap();
        load_from_str(&String::from_utf8(buf).unwrap()).unwrap()
    }

    #[test]
    fn full_run_on_synthetic_catalog() {
        let out = run_fit_with_ingest(&config(None), synthetic_ingest(0.0)).unwrap();

        let g0 = out.rar.as_ref().and_then(|f| f.param("g0")).unwrap();
        assert!((g0 / 1.2e-10 - 1.0).abs() < 1e-3, "g0 = {g0:e}");
        assert_eq!(out.halos.fits.len() + out.halos.failures.len(), 5);
        assert_eq!(out.offsets.len(), 5);
        for o in &out.offsets {
            assert!(o.mean_dex.abs() < 1e-4, "{o:?}");
        }
        assert_eq!(out.report.rows_used, 50);
        assert!(out.report.rar_error.is_none());
    }

    #[test]
    fn filter_that_removes_everything_is_empty_dataset() {
        // Noise-free catalogs report a 2% velocity error.
        let err = run_fit_with_ingest(&config(Some(0.01)), synthetic_ingest(0.0)).unwrap_err();
        assert!(matches!(err, AppError::EmptyDataset { .. }));
    }

    #[test]
    fn filter_keeps_rows_under_threshold() {
        let out = run_fit_with_ingest(&config(Some(0.5)), synthetic_ingest(0.0)).unwrap();
        assert_eq!(out.dataset.len(), 50);
    }
}
