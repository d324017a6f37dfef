//! Reporting utilities: RAR offsets, rankings, and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{Dataset, FitResult, m_to_kpc};
use crate::error::AppError;
use crate::io::FitReport;

/// Mean log-offset of one galaxy from a fitted RAR.
#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyOffset {
    pub galaxy: String,
    pub n: usize,
    /// Mean of `log10(g_obs / g_rar(g_bar))` over the galaxy's points.
    pub mean_dex: f64,
}

/// Galaxies sitting furthest above and below the relation (top-N each side).
#[derive(Debug, Clone)]
pub struct Rankings {
    pub above: Vec<GalaxyOffset>,
    pub below: Vec<GalaxyOffset>,
}

/// Per-galaxy mean offset from the fitted RAR, sorted by galaxy id.
pub fn rar_offsets(dataset: &Dataset, rar: &FitResult) -> Result<Vec<GalaxyOffset>, AppError> {
    let mut out = Vec::with_capacity(dataset.galaxy_count());
    for id in dataset.galaxy_ids() {
        let rows = dataset.galaxy(id)?;
        let mut sum = 0.0;
        for r in &rows {
            let g_fit = rar.predict(r.g_bar);
            if !(g_fit.is_finite() && g_fit > 0.0) {
                return Err(AppError::DidNotConverge {
                    model: rar.model,
                    galaxy: Some(id.to_string()),
                    iterations: rar.solver.iterations,
                    reason: "non-finite model prediction".to_string(),
                });
            }
            sum += (r.g_obs / g_fit).log10();
        }
        out.push(GalaxyOffset {
            galaxy: id.to_string(),
            n: rows.len(),
            mean_dex: sum / rows.len() as f64,
        });
    }
    Ok(out)
}

/// Rank galaxies by their offset from the relation.
pub fn rank_offsets(offsets: &[GalaxyOffset], top_n: usize) -> Rankings {
    let mut sorted = offsets.to_vec();
    sorted.sort_by(|a, b| b.mean_dex.total_cmp(&a.mean_dex));
    let above = sorted.iter().filter(|o| o.mean_dex > 0.0).take(top_n).cloned().collect();
    let below = sorted.iter().rev().filter(|o| o.mean_dex < 0.0).take(top_n).cloned().collect();
    Rankings { above, below }
}

/// Format the full run summary (dataset stats + RAR fit + halo table).
pub fn format_summary(report: &FitReport) -> String {
    let mut out = String::new();

    out.push_str("=== rar - SPARC rotation-curve fits ===\n");
    out.push_str(&format!("Source: {}\n", report.source));
    out.push_str(&format!(
        "Rows: read={} used={} dropped={}\n",
        report.rows_read,
        report.rows_used,
        report.rows_read.saturating_sub(report.rows_used)
    ));
    if let Some(s) = &report.stats {
        out.push_str(&format!(
            "Points: n={} | galaxies={} | R=[{:.2}, {:.2}] kpc | g_bar=[{:.3e}, {:.3e}] m/s^2\n",
            s.n_points, s.n_galaxies, s.r_kpc_min, s.r_kpc_max, s.g_bar_min, s.g_bar_max
        ));
    }

    out.push_str("\nRAR:\n");
    match (&report.rar, &report.rar_error) {
        (Some(fit), _) => out.push_str(&format_fit(fit)),
        (None, Some(reason)) => out.push_str(&format!("  failed: {reason}\n")),
        (None, None) => out.push_str("  (not fitted)\n"),
    }

    out.push_str(&format!(
        "\nBurkert halos ({} fitted, {} failed):\n",
        report.halos.fits.len(),
        report.halos.failures.len()
    ));
    out.push_str(&format_halo_table(&report.halos.fits));

    if !report.halos.failures.is_empty() {
        out.push_str("\nFailures:\n");
        for f in &report.halos.failures {
            out.push_str(&format!("  {:<16} {}\n", truncate(&f.galaxy, 16), f.reason));
        }
    }

    out
}

/// Format a single fit (parameters with one-sigma errors and diagnostics).
pub fn format_fit(fit: &FitResult) -> String {
    let mut out = String::new();
    if let Some(g) = &fit.galaxy {
        out.push_str(&format!("  galaxy: {g}\n"));
    }
    let errs = fit.std_errors();
    for (i, (name, value)) in fit.model.param_names().iter().zip(&fit.params).enumerate() {
        match errs.as_ref().and_then(|e| e.get(i)) {
            Some(err) => out.push_str(&format!("  {name:<5}= {value:.4e} ± {err:.2e}\n")),
            None => out.push_str(&format!("  {name:<5}= {value:.4e}\n")),
        }
    }
    out.push_str(&format!(
        "  weighting={:?} n={} rmse={:.4e} iterations={} ({:?})\n",
        fit.weighting, fit.quality.n, fit.quality.rmse, fit.solver.iterations, fit.solver.termination
    ));
    out
}

/// Format the RAR offset rankings.
pub fn format_rankings(rankings: &Rankings) -> String {
    let mut out = String::new();
    out.push_str("Furthest above the RAR:\n");
    out.push_str(&format_offset_table(&rankings.above));
    out.push('\n');
    out.push_str("Furthest below the RAR:\n");
    out.push_str(&format_offset_table(&rankings.below));
    out
}

fn format_halo_table(fits: &[FitResult]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:>4} {:>11} {:>11} {:>8} {:>10} {:>5}\n",
        "galaxy", "n", "rho0[kg/m3]", "r0[m]", "r0[kpc]", "rmse[m/s]", "iter"
    ));
    out.push_str(&format!(
        "{:-<16} {:-<4} {:-<11} {:-<11} {:-<8} {:-<10} {:-<5}\n",
        "", "", "", "", "", "", ""
    ));
    for f in fits {
        let rho0 = f.param("rho0").unwrap_or(f64::NAN);
        let r0 = f.param("r0").unwrap_or(f64::NAN);
        out.push_str(&format!(
            "{:<16} {:>4} {:>11.3e} {:>11.3e} {:>8.2} {:>10.1} {:>5}\n",
            truncate(f.galaxy.as_deref().unwrap_or("?"), 16),
            f.quality.n,
            rho0,
            r0,
            m_to_kpc(r0),
            f.quality.rmse,
            f.solver.iterations
        ));
    }
    out
}

fn format_offset_table(rows: &[GalaxyOffset]) -> String {
    let mut out = format!("{:<16} {:>4} {:>9}\n", "galaxy", "n", "dex");
    for o in rows {
        out.push_str(&format!("{:<16} {:>4} {:>+9.3}\n", truncate(&o.galaxy, 16), o.n, o.mean_dex));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('.');
    out
}
