//! Crate-wide error type.
//!
//! Every failure surfaced to a caller is a named variant; row-level problems
//! during ingest are recorded as [`crate::io::RowError`] instead and only
//! become an `AppError` when they leave nothing to fit.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::ModelKind;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required column is absent from the catalog header.
    #[error("Missing required column: `{column}`")]
    Schema { column: String },

    /// A numeric cell could not be coerced to a number.
    #[error("Line {line}: column `{column}` has non-numeric value '{value}'")]
    Parse {
        line: usize,
        column: String,
        value: String,
    },

    #[error("Galaxy '{galaxy}' not found in dataset")]
    NotFound { galaxy: String },

    #[error("Galaxy '{galaxy}' has {points} usable point(s); at least {required} are required")]
    InsufficientData {
        galaxy: String,
        points: usize,
        required: usize,
    },

    #[error("{} fit{} did not converge after {iterations} iteration(s): {reason}", model.display_name(), fmt_galaxy(galaxy))]
    DidNotConverge {
        model: ModelKind,
        galaxy: Option<String>,
        iterations: usize,
        reason: String,
    },

    #[error("No valid rows remain after normalization/filtering ({rows_read} read)")]
    EmptyDataset { rows_read: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for the `rar` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Schema { .. }
            | AppError::Parse { .. }
            | AppError::InvalidConfig(_)
            | AppError::Io { .. }
            | AppError::Csv(_)
            | AppError::Json(_) => 2,
            AppError::NotFound { .. }
            | AppError::InsufficientData { .. }
            | AppError::EmptyDataset { .. } => 3,
            AppError::DidNotConverge { .. } => 4,
        }
    }
}

fn fmt_galaxy(galaxy: &Option<String>) -> String {
    match galaxy {
        Some(id) => format!(" for galaxy '{id}'"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_galaxy_or_column() {
        let err = AppError::Schema {
            column: "vobs".to_string(),
        };
        assert!(err.to_string().contains("vobs"));
        assert_eq!(err.exit_code(), 2);

        let err = AppError::DidNotConverge {
            model: ModelKind::Burkert,
            galaxy: Some("NGC3198".to_string()),
            iterations: 200,
            reason: "iteration budget exhausted".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("NGC3198"), "{msg}");
        assert!(msg.contains("Burkert"), "{msg}");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn not_found_and_insufficient_data_are_distinct() {
        let a = AppError::NotFound {
            galaxy: "X".to_string(),
        };
        let b = AppError::InsufficientData {
            galaxy: "X".to_string(),
            points: 1,
            required: 2,
        };
        assert!(matches!(a, AppError::NotFound { .. }));
        assert!(matches!(b, AppError::InsufficientData { .. }));
        assert_ne!(a.to_string(), b.to_string());
    }
}
