//! Error types shared across the system

use thiserror::Error;

/// Base error type for the entire annotation pipeline
#[derive(Error, Debug)]
pub enum DocqError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cluster {cluster} not ready after {waited_secs}s")]
    ProvisioningTimeout { cluster: String, waited_secs: u64 },

    #[error("job {job_id} exceeded time bound after {waited_secs}s")]
    JobTimeout { job_id: String, waited_secs: u64 },

    #[error("cluster api error after {attempts} attempt(s): {message}")]
    Api { message: String, attempts: u32 },

    #[error("output column {column} already exists in input partition")]
    ColumnConflict { column: String },

    #[error("scoring model initialization failed: {0}")]
    ScoringModelInit(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("pipeline run cancelled")]
    Cancelled,
}

impl DocqError {
    /// Errors that indicate operator misconfiguration rather than a
    /// transient runtime condition. These are never retried.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            DocqError::Configuration(_)
                | DocqError::ColumnConflict { .. }
                | DocqError::ScoringModelInit(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DocqError>;
