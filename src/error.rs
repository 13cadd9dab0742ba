// ⚠️ Error Taxonomy
// Which failures cross the core boundary and which get absorbed

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Malformed submission (amount or description). Raised before the pipeline runs.
    #[error("invalid submission: {0}")]
    Validation(String),

    /// Delete requested for an identifier the store does not hold
    #[error("expense {0} not found")]
    NotFound(i64),

    /// Anomaly model could not be fitted. Never leaves the detector.
    #[error("anomaly model could not be fitted: {0}")]
    ModelFitting(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to encode audit data: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl TrackerError {
    /// StorageFailure class: collaborator I/O problems, propagated unchanged
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, TrackerError::Storage(_) | TrackerError::Encoding(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
