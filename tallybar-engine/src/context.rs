//! Process-wide context.
//!
//! Everything that would otherwise be a module-level singleton (limiter
//! registry, client cache, stores) is owned here and handed to
//! orchestrators and modules at construction time.

use std::path::Path;
use std::sync::Arc;

use tallybar_core::{Tenant, TenantId};
use tallybar_fetch::{FetchContext, Transport};
use tallybar_providers::ClientManager;
use tallybar_store::{
    Config, FileKeyValueStore, MemoryKeyValueStore, SharedKeyValueStore, Stores,
};
use tracing::debug;

use crate::error::EngineError;

/// Shared state of one execution context.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Authorized clients per tenant.
    pub clients: Arc<ClientManager>,
    /// All stores.
    pub stores: Stores,
}

impl AppContext {
    /// Builds a context from its parts.
    pub fn new(
        config: Config,
        fetch: FetchContext,
        durable: &SharedKeyValueStore,
        session: &SharedKeyValueStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            clients: Arc::new(ClientManager::new(fetch)),
            stores: Stores::open(durable, session),
        }
    }

    /// Opens the privileged context: network transport, durable stores in
    /// the default data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn open(config: Config) -> Result<Self, EngineError> {
        let durable: SharedKeyValueStore = Arc::new(FileKeyValueStore::open_default());
        Self::open_with(config, durable)
    }

    /// Opens the privileged context with durable stores under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn open_at(config: Config, dir: &Path) -> Result<Self, EngineError> {
        let durable: SharedKeyValueStore = Arc::new(FileKeyValueStore::new(dir));
        Self::open_with(config, durable)
    }

    fn open_with(config: Config, durable: SharedKeyValueStore) -> Result<Self, EngineError> {
        let fetch = FetchContext::http(config.fetch_settings())?;
        let session: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
        debug!(settings = ?fetch.settings, "Opened app context");
        Ok(Self::new(config, fetch, &durable, &session))
    }

    /// The transport every client uses.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.clients.fetch().transport)
    }

    /// Looks up a registered tenant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TenantNotFound`] for an unknown id.
    pub fn tenant(&self, id: &TenantId) -> Result<Tenant, EngineError> {
        self.stores
            .tenants
            .get(id)
            .ok_or_else(|| EngineError::TenantNotFound(id.clone()))
    }
}
