//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments (plus `.env`)
//! - resolves a `PipelineConfig`
//! - runs the requested fits
//! - prints reports and writes optional exports

use std::path::PathBuf;

use clap::Parser;
use log::info;

use crate::cli::{Command, DatasetArgs, FitArgs, G0Args, HaloArgs, SolverArgs, SynthArgs};
use crate::data::{SyntheticSpec, generate_catalog, write_catalog_csv};
use crate::domain::{PipelineConfig, SolverOptions};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable naming the default catalog.
pub const CSV_ENV: &str = "SPARC_CSV";
/// Catalog used when neither `--csv` nor `$SPARC_CSV` is given.
pub const DEFAULT_CSV: &str = "GALAXY_CSVDATA.csv";

/// Entry point for the `rar` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `rar` and `rar --csv x.csv` behave like `rar fit ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::G0(args) => handle_g0(args),
        Command::Halo(args) => handle_halo(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    let mut summary = crate::report::format_summary(&run.report);
    if run.rar.is_some() {
        summary.push('\n');
        summary.push_str(&crate::report::format_rankings(&run.rankings));
    }
    println!("{summary}");

    // Optional exports.
    if let Some(path) = &config.export_dataset {
        crate::io::write_dataset_csv(path, &run.dataset)?;
        info!("Wrote dataset to '{}'", path.display());
    }
    if let Some(path) = &config.export_fits {
        crate::io::write_fit_report_json(path, &run.report)?;
        info!("Wrote fit report to '{}'", path.display());
    }
    if let Some(path) = &config.report_path {
        std::fs::write(path, &summary).map_err(|e| AppError::io(path, e))?;
    }

    Ok(())
}

fn handle_g0(args: G0Args) -> Result<(), AppError> {
    let config = base_config(&args.dataset, &args.solver)?;
    let (_, dataset) = pipeline::load_working_dataset(&config)?;
    let fit = crate::fit::fit_rar(&dataset, &config.solver)?;

    println!("RAR ({} galaxies, {} points):", dataset.galaxy_count(), dataset.len());
    print!("{}", crate::report::format_fit(&fit));
    Ok(())
}

fn handle_halo(args: HaloArgs) -> Result<(), AppError> {
    let config = base_config(&args.dataset, &args.solver)?;
    let (_, dataset) = pipeline::load_working_dataset(&config)?;
    let fit = crate::fit::fit_burkert(&dataset, &args.galaxy, &config.solver)?;

    println!("Burkert:");
    print!("{}", crate::report::format_fit(&fit));
    if let Some(r0) = fit.param("r0") {
        println!("  r0   = {:.3} kpc", crate::domain::m_to_kpc(r0));
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SyntheticSpec {
        galaxies: args.galaxies,
        points_per_galaxy: args.points,
        g0: args.g0,
        noise: args.noise,
        r_min_kpc: args.r_min,
        r_max_kpc: args.r_max,
        seed: args.seed,
    };
    let records = generate_catalog(&spec)?;
    write_catalog_csv(&args.out, &records)?;
    println!("Wrote {} row(s) for {} galaxies to '{}'", records.len(), spec.galaxies, args.out.display());
    Ok(())
}

pub fn pipeline_config_from_args(args: &FitArgs) -> Result<PipelineConfig, AppError> {
    let mut config = base_config(&args.dataset, &args.solver)?;
    config.top_n = args.top;
    config.export_dataset = args.export_dataset.clone();
    config.export_fits = args.export_fits.clone();
    config.report_path = args.report.clone();
    Ok(config)
}

fn base_config(dataset: &DatasetArgs, solver: &SolverArgs) -> Result<PipelineConfig, AppError> {
    let csv_path = resolve_csv_path(dataset.csv.clone(), std::env::var(CSV_ENV).ok());
    let config = PipelineConfig {
        csv_path,
        max_rel_error: dataset.max_rel_error,
        solver: solver.to_options(),
        top_n: 10,
        export_dataset: None,
        export_fits: None,
        report_path: None,
    };
    validate_config(&config)?;
    Ok(config)
}

/// `--csv` wins, then the environment, then the default file name.
fn resolve_csv_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV))
}

fn validate_config(config: &PipelineConfig) -> Result<(), AppError> {
    if let Some(t) = config.max_rel_error {
        if !(t.is_finite() && t > 0.0) {
            return Err(AppError::InvalidConfig(format!("--max-rel-error must be > 0, got {t}")));
        }
    }
    validate_solver(&config.solver)
}

fn validate_solver(opts: &SolverOptions) -> Result<(), AppError> {
    if opts.max_iterations == 0 {
        return Err(AppError::InvalidConfig("--max-iterations must be > 0".to_string()));
    }
    for (name, v) in [("ftol", opts.ftol), ("xtol", opts.xtol), ("gtol", opts.gtol)] {
        if !(v.is_finite() && v >= 0.0) {
            return Err(AppError::InvalidConfig(format!("--{name} must be >= 0, got {v}")));
        }
    }
    Ok(())
}

/// Rewrite argv so `rar` defaults to `rar fit`.
///
/// Rules:
/// - `rar`                      -> `rar fit`
/// - `rar --csv x.csv ...`      -> `rar fit --csv x.csv ...`
/// - `rar --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_fit() {
        assert_eq!(rewrite_args(args(&["rar"])), args(&["rar", "fit"]));
        assert_eq!(
            rewrite_args(args(&["rar", "--csv", "a.csv"])),
            args(&["rar", "fit", "--csv", "a.csv"])
        );
        assert_eq!(rewrite_args(args(&["rar", "--help"])), args(&["rar", "--help"]));
        assert_eq!(rewrite_args(args(&["rar", "g0"])), args(&["rar", "g0"]));
    }

    #[test]
    fn csv_path_precedence() {
        assert_eq!(
            resolve_csv_path(Some(PathBuf::from("flag.csv")), Some("env.csv".to_string())),
            PathBuf::from("flag.csv")
        );
        assert_eq!(resolve_csv_path(None, Some("env.csv".to_string())), PathBuf::from("env.csv"));
        assert_eq!(resolve_csv_path(None, Some("  ".to_string())), PathBuf::from(DEFAULT_CSV));
        assert_eq!(resolve_csv_path(None, None), PathBuf::from(DEFAULT_CSV));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dataset = DatasetArgs {
            csv: Some(PathBuf::from("x.csv")),
            max_rel_error: Some(-0.1),
        };
        let solver = SolverArgs {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        };
        assert!(matches!(base_config(&dataset, &solver), Err(AppError::InvalidConfig(_))));

        let dataset = DatasetArgs {
            max_rel_error: None,
            ..dataset
        };
        let solver = SolverArgs {
            max_iterations: 0,
            ..solver
        };
        let err = base_config(&dataset, &solver).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
