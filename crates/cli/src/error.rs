//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling a session
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] contracts::ContractError),

    /// Sensor sources could not be built
    #[error("Failed to build sensor sources: {0}")]
    Sources(#[from] sensor_sources::SourceLoadError),

    /// Mapping engine could not be initialized
    #[error("Failed to initialize mapping engine: {0}")]
    Engine(#[from] mapping_facade::FacadeError),

    /// Ingestion could not start or a task died
    #[error(transparent)]
    Ingestion(#[from] ingestion::IngestionError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
