//! Cost orchestrator.

use std::sync::Arc;

use tallybar_core::{Cost, Period, Tenant};
use tallybar_providers::ClientManager;
use tallybar_store::CostStore;
use tracing::{info, instrument};

use super::resolve;
use crate::context::AppContext;
use crate::error::EngineError;

/// Refreshes tenant costs.
#[derive(Debug, Clone)]
pub struct CostOrchestrator {
    clients: Arc<ClientManager>,
    store: CostStore,
}

impl CostOrchestrator {
    /// Creates the orchestrator.
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            clients: Arc::clone(&ctx.clients),
            store: ctx.stores.costs.clone(),
        }
    }

    /// Fetches the costs of `period` and replaces the stored entries.
    ///
    /// # Errors
    ///
    /// Returns the fetch or store error.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, platform = %tenant.platform()))]
    pub async fn refresh(&self, tenant: &Tenant, period: Period) -> Result<Vec<Cost>, EngineError> {
        let (driver, client) = resolve(&self.clients, tenant);
        let costs = driver.fetch_costs(&client, period).await?;
        self.store.set(&tenant.id, period, costs.clone()).await?;
        info!(entries = costs.len(), total = Cost::total_credit(&costs), "Refreshed costs");
        Ok(costs)
    }
}
