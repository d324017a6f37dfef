//! Command-line parsing for the SPARC rotation-curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::SolverOptions;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rar", version, about = "SPARC rotation curves: RAR and Burkert halo fits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a catalog, fit the RAR and every galaxy's halo, print a summary, optionally export.
    Fit(FitArgs),
    /// Fit only the global RAR acceleration scale g0.
    G0(G0Args),
    /// Fit the Burkert halo of a single galaxy.
    Halo(HaloArgs),
    /// Write a synthetic catalog that follows the RAR.
    Synth(SynthArgs),
}

/// Where the catalog comes from and how it is pre-filtered.
#[derive(Debug, Args, Clone)]
pub struct DatasetArgs {
    /// Catalog CSV (defaults to $SPARC_CSV, then GALAXY_CSVDATA.csv).
    #[arg(long, value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// Drop rows whose relative velocity error is at or above this threshold.
    #[arg(long)]
    pub max_rel_error: Option<f64>,
}

/// Levenberg–Marquardt stopping rules.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Residual-evaluation budget per fit.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Relative cost-reduction tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub ftol: f64,

    /// Relative step-size tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub xtol: f64,

    /// Scaled-gradient tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub gtol: f64,
}

impl SolverArgs {
    pub fn to_options(&self) -> SolverOptions {
        SolverOptions {
            max_iterations: self.max_iterations,
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
        }
    }
}

/// Options for the full pipeline.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Show the top-N galaxies above and below the fitted RAR.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the normalized dataset (with SI columns) to CSV.
    #[arg(long = "export-dataset", value_name = "CSV")]
    pub export_dataset: Option<PathBuf>,

    /// Export all fit results to JSON.
    #[arg(long = "export-fits", value_name = "JSON")]
    pub export_fits: Option<PathBuf>,

    /// Also write the text summary to this file.
    #[arg(long, value_name = "TXT")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct G0Args {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub solver: SolverArgs,
}

#[derive(Debug, Args, Clone)]
pub struct HaloArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Galaxy identifier, e.g. NGC3198.
    #[arg(short, long)]
    pub galaxy: String,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 12)]
    pub galaxies: usize,

    #[arg(long, default_value_t = 15)]
    pub points: usize,

    /// RAR acceleration scale (m/s^2).
    #[arg(long, default_value_t = 1.2e-10)]
    pub g0: f64,

    /// Relative 1-sigma noise on Vobs.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 0.5)]
    pub r_min: f64,

    #[arg(long, default_value_t = 20.0)]
    pub r_max: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
