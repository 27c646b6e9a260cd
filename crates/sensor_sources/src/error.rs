//! Sensor source error types

use std::path::PathBuf;

use thiserror::Error;

/// Failure while building a sensor source
///
/// Polling failures use [`contracts::SourceError`]; this covers construction.
#[derive(Debug, Error)]
pub enum SourceLoadError {
    /// Dataset file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `sensors.jsonl` line is not valid JSON
    #[error("invalid record at line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A record parsed but lacks the fields its sensor type needs
    #[error("invalid {sensor_type} record for '{sensor}' at line {line}: {message}")]
    InvalidRecord {
        sensor: String,
        sensor_type: &'static str,
        line: usize,
        message: String,
    },

    /// Source attribute could not be interpreted
    #[error("invalid attribute '{key}' for sensor '{sensor}': {message}")]
    InvalidAttribute {
        sensor: String,
        key: String,
        message: String,
    },

    /// Replay source configured without a dataset directory
    #[error("sensor '{sensor}' uses a replay source but no dataset path is configured")]
    MissingReplayPath { sensor: String },

    /// Mock source configured without a data rate
    #[error("sensor '{sensor}' uses a mock source but has no data rate")]
    MissingFrequency { sensor: String },
}

impl SourceLoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_record(
        sensor: impl Into<String>,
        sensor_type: &'static str,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            sensor: sensor.into(),
            sensor_type,
            line,
            message: message.into(),
        }
    }

    pub fn invalid_attribute(
        sensor: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            sensor: sensor.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SourceLoadError>;
