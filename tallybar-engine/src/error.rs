//! Engine error types.

use tallybar_fetch::FetchError;
use tallybar_store::StoreError;
use thiserror::Error;

/// Errors from orchestrators, modules and message handlers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A platform request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A store write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No tenant with this id is registered.
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// A message payload could not be decoded.
    #[error("Invalid message payload: {0}")]
    InvalidMessage(String),

    /// A background module failed to start.
    #[error("Module {module} failed to start: {message}")]
    ModuleInit {
        /// Module name.
        module: &'static str,
        /// What went wrong.
        message: String,
    },
}

impl EngineError {
    /// Returns true for errors that must never be shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_silent())
    }

    /// Returns the message to show the user, or `None` for silent errors.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Fetch(e) => e.user_message(),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_rate_limit_is_silent() {
        let err = EngineError::from(
            FetchError::RateLimited { until: Utc::now() }.in_platform("newapi", "fetch_balance"),
        );
        assert!(err.is_silent());
        assert_eq!(err.user_message(), None);
    }

    #[test]
    fn test_transport_message_is_shown() {
        let err = EngineError::from(FetchError::Transport {
            status: Some(401),
            message: "invalid token".to_string(),
            body: None,
        });
        assert!(!err.is_silent());
        assert_eq!(err.user_message().as_deref(), Some("invalid token"));

        let err = EngineError::TenantNotFound("t1".to_string());
        assert_eq!(err.user_message().as_deref(), Some("Tenant not found: t1"));
    }
}
