//! Core error types for `TallyBar`.

use thiserror::Error;

/// Core error type for `TallyBar` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Tenant not found.
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// A tenant with the same base URL and user id already exists.
    #[error("Tenant already registered for {url} (user {user_id})")]
    DuplicateTenant {
        /// Normalized base URL.
        url: String,
        /// Platform user id, or `-` when absent.
        user_id: String,
    },

    /// Platform type string is not one of the supported platforms.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data from API response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
