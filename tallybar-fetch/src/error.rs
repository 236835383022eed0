//! Fetch error types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tallybar_core::CoreError;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or non-2xx response.
    #[error("Request failed{}: {message}", status_suffix(.status))]
    Transport {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Platform message, or the status text.
        message: String,
        /// Raw response body.
        body: Option<String>,
    },

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The limiter for this base URL is cooling down after a 429.
    #[error("Rate limited until {until}")]
    RateLimited {
        /// When the cooldown ends.
        until: DateTime<Utc>,
    },

    /// A raw payload had a structurally wrong field.
    #[error("Invalid field `{field}`: {message}")]
    Transformation {
        /// The offending field path.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Unknown platform type.
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    /// A lower-level error with platform and method context.
    #[error("{platform}.{method} failed: {source}")]
    PlatformApi {
        /// Platform name.
        platform: String,
        /// Service method that failed.
        method: &'static str,
        /// Underlying error.
        #[source]
        source: Box<FetchError>,
    },

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request could not be built (bad URL or header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Core error.
    #[error("Core error: {0}")]
    Core(CoreError),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl From<CoreError> for FetchError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedPlatform(name) => Self::PlatformNotSupported(name),
            other => Self::Core(other),
        }
    }
}

impl FetchError {
    /// Creates a transformation error for `field`.
    pub fn transformation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transformation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps this error with platform/method context.
    #[must_use]
    pub fn in_platform(self, platform: impl Into<String>, method: &'static str) -> Self {
        Self::PlatformApi {
            platform: platform.into(),
            method,
            source: Box::new(self),
        }
    }

    /// Strips any [`FetchError::PlatformApi`] wrappers.
    pub fn root(&self) -> &FetchError {
        match self {
            Self::PlatformApi { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the HTTP status, if one was observed.
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Self::Transport { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true for expected backpressure that must never be shown to
    /// the user.
    pub fn is_silent(&self) -> bool {
        matches!(self.root(), Self::RateLimited { .. })
    }

    /// Returns true for server errors (5xx) and 429.
    pub fn is_retryable(&self) -> bool {
        if self.is_silent() {
            return false;
        }
        self.status()
            .is_some_and(|s| (500..600).contains(&s) || s == 429)
    }

    /// Returns the message to show the user, or `None` for silent errors.
    pub fn user_message(&self) -> Option<String> {
        if self.is_silent() {
            return None;
        }
        Some(match self.root() {
            Self::Transport { message, .. } => message.clone(),
            other => other.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(status: u16) -> FetchError {
        FetchError::Transport {
            status: Some(status),
            message: "boom".to_string(),
            body: None,
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(transport(500).is_retryable());
        assert!(transport(503).is_retryable());
        assert!(transport(429).is_retryable());
        assert!(!transport(401).is_retryable());
        assert!(!FetchError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn test_rate_limited_is_silent_and_not_retryable() {
        let err = FetchError::RateLimited { until: Utc::now() };
        assert!(err.is_silent());
        assert!(!err.is_retryable());
        assert!(err.user_message().is_none());

        let wrapped = err.in_platform("newapi", "fetch_balance");
        assert!(wrapped.is_silent());
    }

    #[test]
    fn test_platform_context_keeps_status() {
        let err = transport(502).in_platform("oneapi", "fetch_costs");
        assert_eq!(err.status(), Some(502));
        assert!(err.is_retryable());
        assert_eq!(err.user_message().as_deref(), Some("boom"));
        assert!(err.to_string().contains("oneapi.fetch_costs"));
    }

    #[test]
    fn test_unsupported_platform_maps() {
        let err: FetchError = CoreError::UnsupportedPlatform("sub2api".into()).into();
        assert!(matches!(err, FetchError::PlatformNotSupported(ref p) if p == "sub2api"));
    }
}
