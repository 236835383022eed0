//! new-api raw service.
//!
//! Every endpoint answers `{success, message, data}`; the service returns
//! `data` untouched.
//!
//! | Method              | Endpoint                                   | `data` shape |
//! |---------------------|--------------------------------------------|--------------|
//! | `fetch_balance`     | `GET /api/user/self`                       | `{quota, used_quota, ...}` |
//! | `fetch_costs`       | `GET /api/data/self?start_timestamp&end_timestamp` | `[{model_name, created_at, token_used, count, quota}]` |
//! | `fetch_tokens`      | `GET /api/token/?p&size`                   | `[token]` or `{items: [token], total}` |
//! | `fetch_token_groups`| `GET /api/user/self/groups`                | `{name: {desc, ratio}}` |
//! | `fetch_tenant_info` | `GET /api/status`                          | `{quota_per_unit, usd_exchange_rate, quota_display_type, api_info, announcements}` |

use serde_json::Value;
use tallybar_core::Period;
use tallybar_fetch::{ApiClient, FetchError};
use tracing::{debug, instrument};

use crate::raw::unwrap_envelope;
use crate::window::timestamp_range;

/// Header carrying the platform user id.
pub const USER_HEADER: &str = "New-Api-User";

/// Raw new-api endpoints.
#[derive(Debug, Clone, Copy)]
pub struct NewApiService<'a> {
    client: &'a ApiClient,
}

impl<'a> NewApiService<'a> {
    /// Creates a service over an authorized client.
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let payload = self.client.get(path, query).await?;
        unwrap_envelope(payload.into_json()?)
    }

    /// Fetches the user record.
    ///
    /// # Errors
    ///
    /// Propagates transport errors and `success: false` responses.
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_balance(&self) -> Result<Value, FetchError> {
        self.get("/api/user/self", &[]).await
    }

    /// Fetches per-model quota data for `period`.
    ///
    /// # Errors
    ///
    /// See [`NewApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_costs(&self, period: Period) -> Result<Value, FetchError> {
        let (start, end) = timestamp_range(period);
        debug!(start, end, "Fetching quota data");
        self.get(
            "/api/data/self",
            &[
                ("start_timestamp", start.to_string()),
                ("end_timestamp", end.to_string()),
            ],
        )
        .await
    }

    /// Fetches one page of tokens.
    ///
    /// # Errors
    ///
    /// See [`NewApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tokens(&self, page: u32, size: u32) -> Result<Value, FetchError> {
        self.get(
            "/api/token/",
            &[("p", page.to_string()), ("size", size.to_string())],
        )
        .await
    }

    /// Fetches the user's selectable groups.
    ///
    /// # Errors
    ///
    /// See [`NewApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_token_groups(&self) -> Result<Value, FetchError> {
        self.get("/api/user/self/groups", &[]).await
    }

    /// Fetches the public status document.
    ///
    /// # Errors
    ///
    /// See [`NewApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tenant_info(&self) -> Result<Value, FetchError> {
        self.get("/api/status", &[]).await
    }
}
