//! Error types for synchronized data

use thiserror::Error;

/// Synchronized data errors
#[derive(Error, Debug)]
pub enum StateError {
    /// Strict read of a key that was never written
    #[error("Key not found in synchronized data: {0}")]
    KeyNotFound(String),

    /// Second write to a write-once key within the same period
    #[error("Key already set in period {period}: {key}")]
    AlreadySet { key: String, period: u64 },

    /// Stored value does not have the requested shape
    #[error("Invalid value for key {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for synchronized data operations
pub type StateResult<T> = Result<T, StateError>;
