//! Platform driver trait.
//!
//! A driver pairs one platform's raw service with its adapter. Every method
//! fetches the raw payload and returns the normalized value; errors carry
//! the platform and method as [`FetchError::PlatformApi`] context.

use async_trait::async_trait;
use tallybar_core::{Balance, Cost, Period, PlatformType, Tenant, TenantInfo, Token, TokenGroups};
use tallybar_fetch::{ApiClient, FetchError};

/// Default page size for token listings.
pub const DEFAULT_TOKEN_PAGE_SIZE: u32 = 50;

/// One billing platform.
#[async_trait]
pub trait PlatformDriver: Send + Sync {
    /// The platform this driver serves.
    fn platform(&self) -> PlatformType;

    /// Adds the platform's auth headers for `tenant` to `client`.
    fn authorize(&self, client: ApiClient, tenant: &Tenant) -> ApiClient;

    /// Fetches remaining and consumed quota.
    async fn fetch_balance(&self, client: &ApiClient) -> Result<Balance, FetchError>;

    /// Fetches cost entries for `period`.
    async fn fetch_costs(&self, client: &ApiClient, period: Period) -> Result<Vec<Cost>, FetchError>;

    /// Fetches one page of API tokens. Pages start at 1.
    async fn fetch_tokens(
        &self,
        client: &ApiClient,
        page: u32,
        size: u32,
    ) -> Result<Vec<Token>, FetchError>;

    /// Fetches the token groups available to the tenant.
    async fn fetch_token_groups(&self, client: &ApiClient) -> Result<TokenGroups, FetchError>;

    /// Fetches display and credit-unit information.
    async fn fetch_tenant_info(&self, client: &ApiClient) -> Result<TenantInfo, FetchError>;
}

/// Returns a closure that adds platform/method context to an error.
pub(crate) fn context(
    platform: PlatformType,
    method: &'static str,
) -> impl FnOnce(FetchError) -> FetchError {
    move |err| err.in_platform(platform.cli_name(), method)
}
