//! Fetch context shared by every platform client.
//!
//! The context owns the transport and the limiter registry. It is built once
//! per process and handed to whatever creates clients; nothing in this crate
//! is a global.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::client::ApiClient;
use crate::error::FetchError;
use crate::rate_limit::{DEFAULT_COOLDOWN, DEFAULT_QPS, RateLimiterRegistry};
use crate::retry::RetryPolicy;
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport, Transport};

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Timeout for each request.
    pub timeout: Duration,
    /// Retry policy for idempotent requests.
    pub retry: RetryPolicy,
    /// Requests per second per base URL.
    pub default_qps: usize,
    /// Per-base-URL QPS overrides.
    pub qps_overrides: HashMap<String, usize>,
    /// Cooldown after a 429.
    pub cooldown: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            default_qps: DEFAULT_QPS,
            qps_overrides: HashMap::new(),
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl FetchSettings {
    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Transport plus limiter registry.
#[derive(Clone)]
pub struct FetchContext {
    /// Transport used by every client.
    pub transport: Arc<dyn Transport>,
    /// Limiters keyed by base URL.
    pub limiters: Arc<RateLimiterRegistry>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("limiters", &self.limiters)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FetchContext {
    /// Creates a context over the network transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn http(settings: FetchSettings) -> Result<Self, FetchError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new()?), settings))
    }

    /// Creates a context over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>, settings: FetchSettings) -> Self {
        let limiters = RateLimiterRegistry::new(settings.default_qps)
            .with_cooldown(settings.cooldown)
            .with_overrides(settings.qps_overrides.clone());
        Self {
            transport,
            limiters: Arc::new(limiters),
            settings,
        }
    }

    /// Creates a client for `base_url` sharing that URL's limiter.
    pub fn client(&self, base_url: &str) -> ApiClient {
        ApiClient::new(
            base_url,
            Arc::clone(&self.transport),
            self.limiters.get(base_url),
        )
        .with_retry(self.settings.retry)
        .with_timeout(self.settings.timeout)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::transport::{FetchRequest, Payload};

    struct Null;

    #[async_trait]
    impl Transport for Null {
        async fn send(&self, _request: FetchRequest) -> Result<Payload, FetchError> {
            Ok(Payload::Text(String::new()))
        }
    }

    #[test]
    fn test_clients_share_limiter_per_url() {
        let ctx = FetchContext::with_transport(Arc::new(Null), FetchSettings::default());
        let a = ctx.client("https://api.example");
        let b = ctx.client("https://api.example/");
        let c = ctx.client("https://other.example");

        assert!(Arc::ptr_eq(a.limiter(), b.limiter()));
        assert!(!Arc::ptr_eq(a.limiter(), c.limiter()));
        assert_eq!(ctx.limiters.len(), 2);
    }
}
