//! Veloera raw service.
//!
//! Veloera is a new-api fork and keeps its routes and `{success, message,
//! data}` envelope, but authenticates with the dashboard session cookie.
//! Token listings are always paged objects (`{items, total}`).

use serde_json::Value;
use tallybar_core::Period;
use tallybar_fetch::{ApiClient, FetchError};
use tracing::instrument;

use crate::raw::unwrap_envelope;
use crate::window::timestamp_range;

/// Header carrying the platform user id.
pub const USER_HEADER: &str = "Veloera-User";

/// Raw Veloera endpoints.
#[derive(Debug, Clone, Copy)]
pub struct VeloeraService<'a> {
    client: &'a ApiClient,
}

impl<'a> VeloeraService<'a> {
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

    /// `GET /api/data/self` over the period's timestamp window.
    ///
    /// # Errors
    ///
    /// See [`VeloeraService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_costs(&self, period: Period) -> Result<Value, FetchError> {
        let (start, end) = timestamp_range(period);
        self.get(
            "/api/data/self",
            &[
                ("start_timestamp", start.to_string()),
                ("end_timestamp", end.to_string()),
            ],
        )
        .await
    }

    /// `GET /api/token/`.
    ///
    /// # Errors
    ///
    /// See [`VeloeraService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tokens(&self, page: u32, size: u32) -> Result<Value, FetchError> {
        self.get(
            "/api/token/",
            &[("p", page.to_string()), ("page_size", size.to_string())],
        )
        .await
    }

    /// `GET /api/user/self/groups`.
    ///
    /// # Errors
    ///
    /// See [`VeloeraService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_token_groups(&self) -> Result<Value, FetchError> {
        self.get("/api/user/self/groups", &[]).await
    }

    /// `GET /api/status`.
    ///
    /// # Errors
    ///
    /// See [`VeloeraService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tenant_info(&self) -> Result<Value, FetchError> {
        self.get("/api/status", &[]).await
    }
}
