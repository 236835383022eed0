//! Balance orchestrator.

use std::sync::Arc;

use tallybar_core::{Balance, Tenant};
use tallybar_providers::ClientManager;
use tallybar_store::BalanceStore;
use tracing::{info, instrument};

use super::resolve;
use crate::context::AppContext;
use crate::error::EngineError;

/// Refreshes tenant balances.
#[derive(Debug, Clone)]
pub struct BalanceOrchestrator {
    clients: Arc<ClientManager>,
    store: BalanceStore,
}

impl BalanceOrchestrator {
    /// Creates the orchestrator.
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            clients: Arc::clone(&ctx.clients),
            store: ctx.stores.balances.clone(),
        }
    }

    /// Fetches the balance and stores it.
    ///
    /// # Errors
    ///
    /// Returns the fetch or store error.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, platform = %tenant.platform()))]
    pub async fn refresh(&self, tenant: &Tenant) -> Result<Balance, EngineError> {
        let (driver, client) = resolve(&self.clients, tenant);
        let balance = driver.fetch_balance(&client).await?;
        self.store.set(&tenant.id, balance).await?;
        info!(remaining = balance.remaining_credit, "Refreshed balance");
        Ok(balance)
    }
}
