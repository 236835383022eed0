//! Tenant info orchestrator.

use std::sync::Arc;

use tallybar_core::{Tenant, TenantInfo};
use tallybar_providers::ClientManager;
use tallybar_store::TenantInfoStore;
use tracing::{info, instrument};

use super::resolve;
use crate::context::AppContext;
use crate::error::EngineError;

/// Refreshes platform display information.
#[derive(Debug, Clone)]
pub struct TenantInfoOrchestrator {
    clients: Arc<ClientManager>,
    store: TenantInfoStore,
}

impl TenantInfoOrchestrator {
    /// Creates the orchestrator.
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            clients: Arc::clone(&ctx.clients),
            store: ctx.stores.tenant_info.clone(),
        }
    }

    /// Fetches the tenant's platform info and stores it.
    ///
    /// # Errors
    ///
    /// Returns the fetch or store error.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, platform = %tenant.platform()))]
    pub async fn refresh(&self, tenant: &Tenant) -> Result<TenantInfo, EngineError> {
        let (driver, client) = resolve(&self.clients, tenant);
        let tenant_info = driver.fetch_tenant_info(&client).await?;
        self.store.set(&tenant.id, tenant_info.clone()).await?;
        info!(
            credit_unit = tenant_info.credit_unit,
            format = %tenant_info.display_format,
            "Refreshed tenant info"
        );
        Ok(tenant_info)
    }
}
