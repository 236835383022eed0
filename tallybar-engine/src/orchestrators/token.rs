//! Token orchestrator.

use std::sync::Arc;

use tallybar_core::{Tenant, Token, TokenGroups};
use tallybar_providers::ClientManager;
use tallybar_store::TokenStore;
use tracing::{info, instrument};

use super::resolve;
use crate::context::AppContext;
use crate::error::EngineError;

/// Refreshes API tokens and token groups.
#[derive(Debug, Clone)]
pub struct TokenOrchestrator {
    clients: Arc<ClientManager>,
    store: TokenStore,
}

impl TokenOrchestrator {
    /// Creates the orchestrator.
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            clients: Arc::clone(&ctx.clients),
            store: ctx.stores.tokens.clone(),
        }
    }

    /// Fetches one page of tokens and stores it as the tenant's token list.
    ///
    /// # Errors
    ///
    /// Returns the fetch or store error.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, platform = %tenant.platform()))]
    pub async fn refresh(&self, tenant: &Tenant, page: u32, size: u32) -> Result<Vec<Token>, EngineError> {
        let (driver, client) = resolve(&self.clients, tenant);
        let tokens = driver.fetch_tokens(&client, page.max(1), size).await?;
        self.store.set_tokens(&tenant.id, tokens.clone()).await?;
        info!(count = tokens.len(), "Refreshed tokens");
        Ok(tokens)
    }

    /// Fetches the token groups and stores them.
    ///
    /// # Errors
    ///
    /// Returns the fetch or store error.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, platform = %tenant.platform()))]
    pub async fn refresh_groups(&self, tenant: &Tenant) -> Result<TokenGroups, EngineError> {
        let (driver, client) = resolve(&self.clients, tenant);
        let groups = driver.fetch_token_groups(&client).await?;
        self.store.set_groups(&tenant.id, groups.clone()).await?;
        info!(count = groups.len(), "Refreshed token groups");
        Ok(groups)
    }
}
