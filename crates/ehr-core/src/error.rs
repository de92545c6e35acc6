//! Error types for dataset construction, patient access and task application.

use ehr_ingest::IngestError;
use thiserror::Error;

/// Errors raised by [`BaseDataset`](crate::BaseDataset) and its task driver.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Configuration, schema or file error from table loading.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A dataset was requested with an empty table list.
    #[error("no tables requested")]
    NoTables,

    /// Patient identifier does not occur in the event relation.
    #[error("patient {patient_id} not found in dataset")]
    PatientNotFound { patient_id: String },

    /// `set_task` was called without a task on a dataset without a default.
    #[error("no default task defined for dataset '{dataset}'")]
    NoDefaultTask { dataset: String },

    /// The task callable failed for one patient.
    #[error("task '{task}' failed for patient {patient_id}: {source}")]
    Task {
        task: String,
        patient_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A produced sample lacks a field declared in the task schemas.
    #[error("task '{task}' produced sample {index} without declared field '{field}'")]
    SampleMissingField {
        task: String,
        field: String,
        index: usize,
    },

    /// Failed query evaluation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for DatasetError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
