//! Domain orchestrators.
//!
//! One orchestrator per data domain. `refresh` picks the tenant's platform
//! driver, fetches and normalizes, writes the result into the domain's store
//! and returns it. Errors propagate; callers fanning out over tenants isolate
//! them. The analytics orchestrator is the exception and recovers locally.

pub mod analytics;
pub mod balance;
pub mod cost;
pub mod tenant_info;
pub mod token;

use tallybar_core::Tenant;
use tallybar_fetch::ApiClient;
use tallybar_providers::{ClientManager, DriverRegistry, PlatformDriver};

pub use analytics::AnalyticsOrchestrator;
pub use balance::BalanceOrchestrator;
pub use cost::CostOrchestrator;
pub use tenant_info::TenantInfoOrchestrator;
pub use token::TokenOrchestrator;

/// The driver for `tenant`'s platform and its authorized client.
fn resolve(clients: &ClientManager, tenant: &Tenant) -> (&'static dyn PlatformDriver, ApiClient) {
    (DriverRegistry::for_tenant(tenant), clients.client_for(tenant))
}
