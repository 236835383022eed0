//! one-api platform.
//!
//! Auth: `Authorization: Bearer <access token>`. There is no user header.

pub mod adapter;
mod service;

use async_trait::async_trait;
use tallybar_core::{Balance, Cost, Period, PlatformType, Tenant, TenantInfo, Token, TokenGroups};
use tallybar_fetch::{ApiClient, FetchError};

use crate::driver::{PlatformDriver, context};

pub use service::{LOG_PAGE_SIZE, OneApiService};

/// Driver for one-api.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneApiDriver;

const PLATFORM: PlatformType = PlatformType::OneApi;

#[async_trait]
impl PlatformDriver for OneApiDriver {
    fn platform(&self) -> PlatformType {
        PLATFORM
    }

    fn authorize(&self, client: ApiClient, tenant: &Tenant) -> ApiClient {
        client.with_bearer(&tenant.token)
    }

    async fn fetch_balance(&self, client: &ApiClient) -> Result<Balance, FetchError> {
        OneApiService::new(client)
            .fetch_balance()
            .await
            .and_then(|raw| adapter::normalize_balance(&raw))
            .map_err(context(PLATFORM, "fetch_balance"))
    }

    async fn fetch_costs(&self, client: &ApiClient, period: Period) -> Result<Vec<Cost>, FetchError> {
        OneApiService::new(client)
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
        OneApiService::new(client)
            .fetch_tokens(page, size)
            .await
            .and_then(|raw| adapter::normalize_tokens(&raw))
            .map_err(context(PLATFORM, "fetch_tokens"))
    }

    async fn fetch_token_groups(&self, client: &ApiClient) -> Result<TokenGroups, FetchError> {
        OneApiService::new(client)
            .fetch_token_groups()
            .await
            .and_then(|raw| adapter::normalize_token_groups(&raw))
            .map_err(context(PLATFORM, "fetch_token_groups"))
    }

    async fn fetch_tenant_info(&self, client: &ApiClient) -> Result<TenantInfo, FetchError> {
        OneApiService::new(client)
            .fetch_tenant_info()
            .await
            .and_then(|raw| adapter::normalize_tenant_info(&raw))
            .map_err(context(PLATFORM, "fetch_tenant_info"))
    }
}
