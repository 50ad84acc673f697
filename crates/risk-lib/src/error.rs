//! Error types for the risk engine

use thiserror::Error;

/// Errors surfaced by training, persistence and configuration.
///
/// Scoring itself never fails; these only come out of the model lifecycle
/// and the data-source boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient training data: {available} usable rows, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("data source error: {0}")]
    Source(String),

    #[error("training failed: {0}")]
    Training(String),
}

impl EngineError {
    /// True when the failure is the "not enough data" outcome rather than a fault
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
