//! Error types for clinical table ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving configuration or loading tables.
#[derive(Debug, Error)]
pub enum IngestError {
    // === Configuration Errors ===
    /// Configuration file missing or unreadable.
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is not a valid table mapping.
    #[error("malformed configuration {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Requested table is not described in the configuration.
    #[error("table '{table}' not found in configuration")]
    TableNotFound { table: String },

    // === File System Errors ===
    /// Source file of a table does not exist.
    #[error("source file for table '{table}' not found: {path}")]
    MissingFile { table: String, path: PathBuf },

    /// Auxiliary file of a join does not exist.
    #[error("join file for table '{table}' not found: {path}")]
    MissingJoinFile { table: String, path: PathBuf },

    // === Scan Errors ===
    /// Failed to build a lazy scan over a source file.
    #[error("failed to scan {path}: {message}")]
    Scan { path: PathBuf, message: String },

    // === DataFrame Errors ===
    /// Failed query plan construction or evaluation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::MissingFile {
            table: "diagnoses".to_string(),
            path: PathBuf::from("/data/DIAGNOSES_ICD.csv"),
        };
        assert_eq!(
            err.to_string(),
            "source file for table 'diagnoses' not found: /data/DIAGNOSES_ICD.csv"
        );
    }

    #[test]
    fn test_error_from_polars() {
        let polars_err = polars::prelude::PolarsError::ColumnNotFound("pid".into());
        let ingest_err: IngestError = polars_err.into();
        assert!(matches!(ingest_err, IngestError::DataFrame { .. }));
    }
}
