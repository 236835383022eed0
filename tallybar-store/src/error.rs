//! Store error types.

use tallybar_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid key for the key-value store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The persisted value for a key is not a JSON object.
    #[error("Corrupt value under {key}: {message}")]
    Corrupt {
        /// Storage key.
        key: String,
        /// What was wrong.
        message: String,
    },

    /// Domain rule violated (duplicate tenant, unknown tenant...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}
