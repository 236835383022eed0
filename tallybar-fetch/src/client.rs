//! Platform API client.
//!
//! [`ApiClient`] composes the fetch stack for one tenant: retry wraps the
//! rate-limited call, which wraps the transport. A 429 from the transport
//! puts the shared limiter into cooldown, so the retry that follows fails
//! fast with a silent [`FetchError::RateLimited`] instead of hammering the
//! platform.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::rate_limit::RateLimiter;
use crate::retry::{RetryPolicy, default_retry_on, with_retry};
use crate::transport::{DEFAULT_TIMEOUT, FetchRequest, Payload, Transport};

/// HTTP client for one tenant's platform.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    headers: BTreeMap<String, String>,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            headers: BTreeMap::new(),
            transport,
            limiter,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        let token = token.trim();
        let value = if token.to_ascii_lowercase().starts_with("bearer ") {
            token.to_string()
        } else {
            format!("Bearer {token}")
        };
        self.with_header("Authorization", value)
    }

    /// Adds a session cookie.
    #[must_use]
    pub fn with_cookie(self, cookie: &str) -> Self {
        self.with_header("Cookie", cookie.trim())
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the limiter shared with other clients of this base URL.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Builds an absolute URL for `path` with query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] if the result is not a valid URL.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| FetchError::InvalidRequest(format!("{}{path}: {e}", self.base_url)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// Performs a GET request.
    ///
    /// # Errors
    ///
    /// Returns the transport error after retries, or
    /// [`FetchError::RateLimited`] while the limiter is cooling down.
    #[instrument(skip(self, query), fields(base = %self.base_url))]
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Payload, FetchError> {
        let mut request = FetchRequest::get(self.url(path, query)?).timeout(self.timeout);
        request.headers.extend(self.headers.clone());
        self.send(request).await
    }

    /// Performs a GET request and deserializes the JSON body.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::get`], plus [`FetchError::Json`] on a body mismatch.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        self.get(path, query).await?.decode()
    }

    /// Sends a prepared request through the limiter and retry policy.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn send(&self, request: FetchRequest) -> Result<Payload, FetchError> {
        let operation = request.url.clone();
        with_retry(&self.retry, &operation, default_retry_on, || {
            let request = request.clone();
            async move {
                let result = self
                    .limiter
                    .execute(|| self.transport.send(request))
                    .await;
                if let Err(err) = &result {
                    if err.status() == Some(429) {
                        debug!(url = %self.base_url, "Platform returned 429");
                        self.limiter.trigger_cooldown(None);
                    }
                }
                result
            }
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
