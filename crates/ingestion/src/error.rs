//! Ingestion error types

use thiserror::Error;

/// Ingestion error
///
/// Per-reading failures never surface here; loops log them and carry on. This covers
/// setup problems and tasks that died.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Runtime configuration is unusable
    #[error("invalid ingestion config at '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    /// An ingestion task panicked or was aborted
    #[error("ingestion task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },
}

impl IngestionError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn task_failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            task: task.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
