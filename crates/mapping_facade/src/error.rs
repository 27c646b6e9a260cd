//! Mapping facade error types

use thiserror::Error;

/// Facade setup error
///
/// Per-call failures use [`contracts::EngineError`]; this covers library lifecycle.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// Library could not be initialized
    #[error("failed to initialize mapping engine library: {message}")]
    InitFailed { message: String },

    /// Internal state could not be exported
    #[error("failed to export internal state: {0}")]
    Export(#[from] serde_json::Error),
}

impl FacadeError {
    pub fn init_failed(message: impl Into<String>) -> Self {
        Self::InitFailed {
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, FacadeError>;
