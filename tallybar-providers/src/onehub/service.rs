//! one-hub raw service.
//!
//! one-hub reports usage as a per-day, per-model dashboard keyed by calendar
//! date rather than timestamps:
//!
//! ```text
//! GET /api/user/dashboard?start_date=2024-05-01&end_date=2024-05-07
//! data: [{date, model_name, request_count, quota, prompt_tokens, complete_tokens}]
//! ```
//!
//! Token listings use `page`/`size` and return `{data, total_count}`.

use serde_json::Value;
use tallybar_core::Period;
use tallybar_fetch::{ApiClient, FetchError};
use tracing::instrument;

use crate::raw::unwrap_envelope;
use crate::window::date_range;

/// Raw one-hub endpoints.
#[derive(Debug, Clone, Copy)]
pub struct OneHubService<'a> {
    client: &'a ApiClient,
}

impl<'a> OneHubService<'a> {
    /// Creates a service over an authorized client.
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let payload = self.client.get(path, query).await?;
        unwrap_envelope(payload.into_json()?)
    }

    /// `GET /api/user/self`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors and `success: false` responses.
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_balance(&self) -> Result<Value, FetchError> {
        self.get("/api/user/self", &[]).await
    }

    /// `GET /api/user/dashboard` over the period's calendar dates.
    ///
    /// # Errors
    ///
    /// See [`OneHubService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_costs(&self, period: Period) -> Result<Value, FetchError> {
        let (start, end) = date_range(period);
        self.get(
            "/api/user/dashboard",
            &[("start_date", start), ("end_date", end)],
        )
        .await
    }

    /// `GET /api/token/`.
    ///
    /// # Errors
    ///
    /// See [`OneHubService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tokens(&self, page: u32, size: u32) -> Result<Value, FetchError> {
        self.get(
            "/api/token/",
            &[("page", page.to_string()), ("size", size.to_string())],
        )
        .await
    }

    /// `GET /api/user_group_map`.
    ///
    /// # Errors
    ///
    /// See [`OneHubService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_token_groups(&self) -> Result<Value, FetchError> {
        self.get("/api/user_group_map", &[]).await
    }

    /// `GET /api/status`.
    ///
    /// # Errors
    ///
    /// See [`OneHubService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tenant_info(&self) -> Result<Value, FetchError> {
        self.get("/api/status", &[]).await
    }
}
