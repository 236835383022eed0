//! Veloera platform.
//!
//! Auth: the tenant's credential is the dashboard session cookie, sent with
//! `Veloera-User: <id>`. A bare value is treated as the `session` cookie.

pub mod adapter;
mod service;

use async_trait::async_trait;
use tallybar_core::{Balance, Cost, Period, PlatformType, Tenant, TenantInfo, Token, TokenGroups};
use tallybar_fetch::{ApiClient, FetchError};

use crate::driver::{PlatformDriver, context};

pub use service::{USER_HEADER, VeloeraService};

/// Driver for Veloera.
#[derive(Debug, Clone, Copy, Default)]
pub struct VeloeraDriver;

const PLATFORM: PlatformType = PlatformType::Veloera;

/// Returns the cookie header value for a stored credential.
fn session_cookie(credential: &str) -> String {
    let credential = credential.trim();
    if credential.contains('=') {
        credential.to_string()
    } else {
        format!("session={credential}")
    }
}

#[async_trait]
impl PlatformDriver for VeloeraDriver {
    fn platform(&self) -> PlatformType {
        PLATFORM
    }

    fn authorize(&self, client: ApiClient, tenant: &Tenant) -> ApiClient {
        let client = client.with_cookie(&session_cookie(&tenant.token));
        match tenant.user_id.as_deref() {
            Some(id) if !id.is_empty() => client.with_header(USER_HEADER, id),
            _ => client,
        }
    }

    async fn fetch_balance(&self, client: &ApiClient) -> Result<Balance, FetchError> {
        VeloeraService::new(client)
            .fetch_balance()
            .await
            .and_then(|raw| adapter::normalize_balance(&raw))
            .map_err(context(PLATFORM, "fetch_balance"))
    }

    async fn fetch_costs(&self, client: &ApiClient, period: Period) -> Result<Vec<Cost>, FetchError> {
        VeloeraService::new(client)
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
        VeloeraService::new(client)
            .fetch_tokens(page, size)
            .await
            .and_then(|raw| adapter::normalize_tokens(&raw))
            .map_err(context(PLATFORM, "fetch_tokens"))
    }

    async fn fetch_token_groups(&self, client: &ApiClient) -> Result<TokenGroups, FetchError> {
        VeloeraService::new(client)
            .fetch_token_groups()
            .await
            .and_then(|raw| adapter::normalize_token_groups(&raw))
            .map_err(context(PLATFORM, "fetch_token_groups"))
    }

    async fn fetch_tenant_info(&self, client: &ApiClient) -> Result<TenantInfo, FetchError> {
        VeloeraService::new(client)
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

    #[test]
    fn test_session_cookie() {
        assert_eq!(session_cookie("abc"), "session=abc");
        assert_eq!(session_cookie(" session=abc; lang=en "), "session=abc; lang=en");
    }

    #[tokio::test]
    async fn test_cookie_auth() {
        let transport = ScriptedTransport::new();
        transport.on("/api/user/self", json!({"success": true, "data": {"quota": 1}}));
        let tenant = Tenant::new("v", "https://api.example", "abc", PlatformType::Veloera)
            .with_user_id("3");
        let client = VeloeraDriver.authorize(transport.client(), &tenant);

        VeloeraDriver.fetch_balance(&client).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.headers["Cookie"], "session=abc");
        assert_eq!(request.headers[USER_HEADER], "3");
        assert!(!request.headers.contains_key("Authorization"));
    }
}
