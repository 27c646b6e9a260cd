//! Layered error definitions
//!
//! Categorized by source: config / sensor source / mapping engine

use std::time::Duration;

use thiserror::Error;

/// Configuration and general contract errors
#[derive(Debug, Error)]
pub enum ContractError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Polling failure reported by a sensor source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Replay source has delivered its last reading
    #[error("end of dataset for sensor '{sensor}'")]
    EndOfDataset { sensor: String },

    /// I/O or device fault; the next poll may succeed
    #[error("sensor '{sensor}' fault: {message}")]
    Fault { sensor: String, message: String },

    /// Reading could not be decoded
    #[error("malformed reading from sensor '{sensor}': {message}")]
    Malformed { sensor: String, message: String },
}

impl SourceError {
    pub fn end_of_dataset(sensor: impl Into<String>) -> Self {
        Self::EndOfDataset {
            sensor: sensor.into(),
        }
    }

    pub fn fault(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    pub fn malformed(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Genuine exhaustion, as opposed to every other polling failure
    pub fn is_end_of_dataset(&self) -> bool {
        matches!(self, Self::EndOfDataset { .. })
    }
}

/// Failure reported by the mapping engine facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Another submission is in flight
    #[error("unable to acquire lock")]
    LockBusy,

    /// Call did not complete within the per-call timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Engine rejected the submission (malformed data, ordering violation, ...)
    #[error("engine rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// Engine library has been terminated
    #[error("mapping engine terminated")]
    Terminated,
}

impl EngineError {
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    /// Lock contention, the expected transient condition
    pub fn is_lock_busy(&self) -> bool {
        matches!(self, Self::LockBusy)
    }
}
