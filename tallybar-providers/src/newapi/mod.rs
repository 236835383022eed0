//! new-api platform (primary).
//!
//! Auth: `Authorization: Bearer <access token>` plus `New-Api-User: <id>`.
//! Cost windows are Unix-second timestamps.

pub mod adapter;
mod service;

use async_trait::async_trait;
use tallybar_core::{Balance, Cost, Period, PlatformType, Tenant, TenantInfo, Token, TokenGroups};
use tallybar_fetch::{ApiClient, FetchError};

use crate::driver::{PlatformDriver, context};

pub use service::{NewApiService, USER_HEADER};

/// Driver for new-api.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewApiDriver;

const PLATFORM: PlatformType = PlatformType::NewApi;

#[async_trait]
impl PlatformDriver for NewApiDriver {
    fn platform(&self) -> PlatformType {
        PLATFORM
    }

    fn authorize(&self, client: ApiClient, tenant: &Tenant) -> ApiClient {
        let client = client.with_bearer(&tenant.token);
        match tenant.user_id.as_deref() {
            Some(id) if !id.is_empty() => client.with_header(USER_HEADER, id),
            _ => client,
        }
    }

    async fn fetch_balance(&self, client: &ApiClient) -> Result<Balance, FetchError> {
        NewApiService::new(client)
            .fetch_balance()
            .await
            .and_then(|raw| adapter::normalize_balance(&raw))
            .map_err(context(PLATFORM, "fetch_balance"))
    }

    async fn fetch_costs(&self, client: &ApiClient, period: Period) -> Result<Vec<Cost>, FetchError> {
        NewApiService::new(client)
            .fetch_costs(period)
            .await
            .and_then(|raw| adapter::normalize_costs(&raw))
            .map_err(context(PLATFORM, "fetch_costs"))
    }

    async fn fetch_tokens(
        &self,
        client: &ApiClient,
        page: u32,
        size: u32,
    ) -> Result<Vec<Token>, FetchError> {
        NewApiService::new(client)
            .fetch_tokens(page, size)
            .await
            .and_then(|raw| adapter::normalize_tokens(&raw))
            .map_err(context(PLATFORM, "fetch_tokens"))
    }

    async fn fetch_token_groups(&self, client: &ApiClient) -> Result<TokenGroups, FetchError> {
        NewApiService::new(client)
            .fetch_token_groups()
            .await
            .and_then(|raw| adapter::normalize_token_groups(&raw))
            .map_err(context(PLATFORM, "fetch_token_groups"))
    }

    async fn fetch_tenant_info(&self, client: &ApiClient) -> Result<TenantInfo, FetchError> {
        NewApiService::new(client)
            .fetch_tenant_info()
            .await
            .and_then(|raw| adapter::normalize_tenant_info(&raw))
            .map_err(context(PLATFORM, "fetch_tenant_info"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedTransport;

    fn tenant() -> Tenant {
        Tenant::new("main", "https://api.example", "tok", PlatformType::NewApi).with_user_id("17")
    }

    #[tokio::test]
    async fn test_balance_sends_auth_headers() {
        let transport = ScriptedTransport::new();
        transport.on(
            "/api/user/self",
            json!({"success": true, "message": "", "data": {"quota": 10, "used_quota": 5}}),
        );
        let client = NewApiDriver.authorize(transport.client(), &tenant());

        let balance = NewApiDriver.fetch_balance(&client).await.unwrap();
        assert_eq!(balance, Balance::new(10.0, 5.0));

        let request = &transport.requests()[0];
        assert_eq!(request.headers["Authorization"], "Bearer tok");
        assert_eq!(request.headers[USER_HEADER], "17");
    }

    #[tokio::test]
    async fn test_costs_use_timestamp_window() {
        let transport = ScriptedTransport::new();
        transport.on("/api/data/self", json!({"success": true, "data": []}));
        let client = NewApiDriver.authorize(transport.client(), &tenant());

        let costs = NewApiDriver.fetch_costs(&client, Period::SevenDays).await.unwrap();
        assert!(costs.is_empty());

        let request = &transport.requests()[0];
        let start: i64 = ScriptedTransport::query(request, "start_timestamp").unwrap().parse().unwrap();
        let end: i64 = ScriptedTransport::query(request, "end_timestamp").unwrap().parse().unwrap();
        assert_eq!(end - start, 7 * 86_400 - 1);
    }

    #[tokio::test]
    async fn test_failure_envelope_carries_context() {
        let transport = ScriptedTransport::new();
        transport.on("/api/status", json!({"success": false, "message": "blocked"}));
        let client = NewApiDriver.authorize(transport.client(), &tenant());

        let err = NewApiDriver.fetch_tenant_info(&client).await.unwrap_err();
        assert!(matches!(err, FetchError::PlatformApi { method: "fetch_tenant_info", .. }));
        assert_eq!(err.user_message().as_deref(), Some("blocked"));
    }

    #[tokio::test]
    async fn test_transformation_error_names_field() {
        let transport = ScriptedTransport::new();
        transport.on("/api/user/self", json!({"success": true, "data": {"quota": [1]}}));
        let client = NewApiDriver.authorize(transport.client(), &tenant());

        let err = NewApiDriver.fetch_balance(&client).await.unwrap_err();
        match err.root() {
            FetchError::Transformation { field, .. } => assert_eq!(field, "user.quota"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
