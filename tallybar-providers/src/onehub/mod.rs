//! one-hub platform.
//!
//! Auth: `Authorization: Bearer <access token>`.

pub mod adapter;
mod service;

use async_trait::async_trait;
use tallybar_core::{Balance, Cost, Period, PlatformType, Tenant, TenantInfo, Token, TokenGroups};
use tallybar_fetch::{ApiClient, FetchError};

use crate::driver::{PlatformDriver, context};

pub use service::OneHubService;

/// Driver for one-hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneHubDriver;

const PLATFORM: PlatformType = PlatformType::OneHub;

#[async_trait]
impl PlatformDriver for OneHubDriver {
    fn platform(&self) -> PlatformType {
        PLATFORM
    }

    fn authorize(&self, client: ApiClient, tenant: &Tenant) -> ApiClient {
        client.with_bearer(&tenant.token)
    }

    async fn fetch_balance(&self, client: &ApiClient) -> Result<Balance, FetchError> {
        OneHubService::new(client)
            .fetch_balance()
            .await
            .and_then(|raw| adapter::normalize_balance(&raw))
            .map_err(context(PLATFORM, "fetch_balance"))
    }

    async fn fetch_costs(&self, client: &ApiClient, period: Period) -> Result<Vec<Cost>, FetchError> {
        OneHubService::new(client)
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
        OneHubService::new(client)
            .fetch_tokens(page, size)
            .await
            .and_then(|raw| adapter::normalize_tokens(&raw))
            .map_err(context(PLATFORM, "fetch_tokens"))
    }

    async fn fetch_token_groups(&self, client: &ApiClient) -> Result<TokenGroups, FetchError> {
        OneHubService::new(client)
            .fetch_token_groups()
            .await
            .and_then(|raw| adapter::normalize_token_groups(&raw))
            .map_err(context(PLATFORM, "fetch_token_groups"))
    }

    async fn fetch_tenant_info(&self, client: &ApiClient) -> Result<TenantInfo, FetchError> {
        OneHubService::new(client)
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

    #[tokio::test]
    async fn test_dashboard_uses_dates() {
        let transport = ScriptedTransport::new();
        transport.on("/api/user/dashboard", json!({"success": true, "data": []}));
        let client = transport.client();

        OneHubDriver.fetch_costs(&client, Period::SevenDays).await.unwrap();

        let request = &transport.requests()[0];
        let start = ScriptedTransport::query(request, "start_date").unwrap();
        let end = ScriptedTransport::query(request, "end_date").unwrap();
        assert_eq!(start.len(), 10);
        assert!(start < end);
        assert!(ScriptedTransport::query(request, "start_timestamp").is_none());
    }

    #[tokio::test]
    async fn test_token_paging_params() {
        let transport = ScriptedTransport::new();
        transport.on("/api/token/", json!({"success": true, "data": {"data": [], "total_count": 0}}));
        let client = transport.client();

        let tokens = OneHubDriver.fetch_tokens(&client, 2, 25).await.unwrap();

        assert!(tokens.is_empty());
        let request = &transport.requests()[0];
        assert_eq!(ScriptedTransport::query(request, "page").as_deref(), Some("2"));
        assert_eq!(ScriptedTransport::query(request, "size").as_deref(), Some("25"));
    }

    #[tokio::test]
    async fn test_failure_carries_platform() {
        let transport = ScriptedTransport::new();
        transport.on("/api/user_group_map", json!({"success": false, "message": "denied"}));
        let client = transport.client();

        let err = OneHubDriver.fetch_token_groups(&client).await.unwrap_err();
        match &err {
            FetchError::PlatformApi { platform, method, .. } => {
                assert_eq!(platform, "onehub");
                assert_eq!(*method, "fetch_token_groups");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.user_message().as_deref(), Some("denied"));
    }
}
