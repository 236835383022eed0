//! one-api raw service.
//!
//! one-api has no aggregated usage endpoint; costs come from the consumption
//! log, one record per request, served a page at a time:
//!
//! ```text
//! GET /api/log/self?p=1&page_size=100&type=2&start_timestamp=..&end_timestamp=..
//! data: [log] | {items: [log], total_pages: N}
//! ```
//!
//! [`OneApiService::fetch_costs`] walks every page and returns the
//! concatenated log array.

use serde_json::Value;
use tallybar_core::Period;
use tallybar_fetch::{ApiClient, FetchError};
use tracing::{debug, instrument};

use crate::raw::unwrap_envelope;
use crate::window::timestamp_range;

/// Log page size requested from the platform.
pub const LOG_PAGE_SIZE: usize = 100;

/// Log type of consumption records.
const LOG_TYPE_CONSUME: &str = "2";

/// Raw one-api endpoints.
#[derive(Debug, Clone, Copy)]
pub struct OneApiService<'a> {
    client: &'a ApiClient,
}

impl<'a> OneApiService<'a> {
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

    /// Fetches every consumption log page for `period`.
    ///
    /// Stops once `page >= total_pages`, or, when the platform doesn't report
    /// `total_pages`, on the first short page. An empty page always ends the
    /// walk.
    ///
    /// # Errors
    ///
    /// See [`OneApiService::fetch_balance`]. A page that is neither an array
    /// nor a page object is a transformation error.
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_costs(&self, period: Period) -> Result<Value, FetchError> {
        let (start, end) = timestamp_range(period);
        let mut logs = Vec::new();
        let mut page: u64 = 1;

        loop {
            let data = self
                .get(
                    "/api/log/self",
                    &[
                        ("p", page.to_string()),
                        ("page_size", LOG_PAGE_SIZE.to_string()),
                        ("type", LOG_TYPE_CONSUME.to_string()),
                        ("start_timestamp", start.to_string()),
                        ("end_timestamp", end.to_string()),
                    ],
                )
                .await?;

            let (items, total_pages) = split_page(data, page)?;
            let count = items.len();
            logs.extend(items);

            let done = match total_pages {
                Some(total) => page >= total || count == 0,
                None => count < LOG_PAGE_SIZE,
            };
            debug!(page, count, ?total_pages, done, "Fetched log page");
            if done {
                break;
            }
            page += 1;
        }

        Ok(Value::Array(logs))
    }

    /// `GET /api/token/`.
    ///
    /// # Errors
    ///
    /// See [`OneApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tokens(&self, page: u32, size: u32) -> Result<Value, FetchError> {
        self.get(
            "/api/token/",
            &[("p", page.to_string()), ("size", size.to_string())],
        )
        .await
    }

    /// `GET /api/group/` (group names only).
    ///
    /// # Errors
    ///
    /// See [`OneApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_token_groups(&self) -> Result<Value, FetchError> {
        self.get("/api/group/", &[]).await
    }

    /// `GET /api/status`.
    ///
    /// # Errors
    ///
    /// See [`OneApiService::fetch_balance`].
    #[instrument(skip(self), fields(base = %self.client.base_url()))]
    pub async fn fetch_tenant_info(&self) -> Result<Value, FetchError> {
        self.get("/api/status", &[]).await
    }
}

/// Splits one log page into its items and the reported page count.
fn split_page(data: Value, page: u64) -> Result<(Vec<Value>, Option<u64>), FetchError> {
    match data {
        Value::Null => Ok((Vec::new(), None)),
        Value::Array(items) => Ok((items, None)),
        Value::Object(mut map) => {
            let total_pages = map.get("total_pages").and_then(Value::as_u64);
            match map.remove("items").unwrap_or(Value::Null) {
                Value::Array(items) => Ok((items, total_pages)),
                Value::Null => Ok((Vec::new(), total_pages)),
                _ => Err(FetchError::transformation(
                    format!("logs.pages[{page}].items"),
                    "expected array",
                )),
            }
        }
        _ => Err(FetchError::transformation(
            format!("logs.pages[{page}]"),
            "expected array or page object",
        )),
    }
}
