//! Conversion of a solver report into an immutable `FitResult`.

use nalgebra::DMatrix;

use crate::domain::{FitQuality, FitResult, ModelKind, SolverSummary, Weighting};
use crate::error::AppError;
use crate::math::{LmReport, SolverFailure};

pub(crate) fn build_result(
    model: ModelKind,
    galaxy: Option<&str>,
    weighting: Weighting,
    report: &LmReport,
) -> FitResult {
    let n = report.residuals.len();
    let k = model.param_count();
    let sse = report.sse();

    FitResult {
        model,
        galaxy: galaxy.map(str::to_string),
        params: report.x.iter().copied().collect(),
        covariance: report.covariance().map(|c| to_nested(&c)),
        weighting,
        quality: FitQuality {
            n,
            sse,
            rmse: (sse / n as f64).sqrt(),
            reduced_chi2: (n > k).then(|| sse / (n - k) as f64),
        },
        solver: SolverSummary {
            converged: true,
            termination: report.termination,
            iterations: report.iterations,
            evaluations: report.evaluations,
        },
    }
}

pub(crate) fn not_converged(model: ModelKind, galaxy: Option<&str>, failure: SolverFailure) -> AppError {
    AppError::DidNotConverge {
        model,
        galaxy: galaxy.map(str::to_string),
        iterations: failure.iterations,
        reason: failure.reason,
    }
}

fn to_nested(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}
