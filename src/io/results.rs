//! Read/write fit report JSON files.
//!
//! A fit report is the portable record of one pipeline run:
//! - where the data came from and what survived normalization
//! - the dataset-wide RAR fit (if it succeeded)
//! - every per-galaxy Burkert fit, plus the galaxies that failed

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DatasetStats, FitResult};
use crate::error::AppError;
use crate::fit::HaloBatch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub rows_read: usize,
    pub rows_used: usize,
    pub stats: Option<DatasetStats>,
    /// `None` when the RAR fit failed; `rar_error` then says why.
    pub rar: Option<FitResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rar_error: Option<String>,
    pub halos: HaloBatch,
}

/// Write a fit report JSON file.
pub fn write_fit_report_json(path: &Path, report: &FitReport) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(())
}

/// Read a fit report JSON file.
pub fn read_fit_report_json(path: &Path) -> Result<FitReport, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let report: FitReport = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(report)
}
