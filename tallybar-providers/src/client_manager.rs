//! Per-tenant authorized clients.
//!
//! A tenant's client is built once (base URL, auth headers, shared limiter)
//! and reused until the tenant's connection details change or the tenant is
//! invalidated. Entries are keyed by tenant id and fingerprinted over the
//! fields that shape the client, so editing a tenant's URL or credential
//! rebuilds its client on next use.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use tallybar_core::{Tenant, TenantId};
use tallybar_fetch::{ApiClient, FetchContext};
use tracing::debug;

use crate::registry::DriverRegistry;

/// Cache of authorized clients.
#[derive(Debug)]
pub struct ClientManager {
    fetch: FetchContext,
    cache: Mutex<HashMap<TenantId, (u64, ApiClient)>>,
}

fn fingerprint(tenant: &Tenant) -> u64 {
    let mut hasher = DefaultHasher::new();
    tenant.base_url().hash(&mut hasher);
    tenant.token.hash(&mut hasher);
    tenant.user_id.hash(&mut hasher);
    tenant.platform().hash(&mut hasher);
    hasher.finish()
}

impl ClientManager {
    /// Creates an empty manager over `fetch`.
    pub fn new(fetch: FetchContext) -> Self {
        Self {
            fetch,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying fetch context.
    pub fn fetch(&self) -> &FetchContext {
        &self.fetch
    }

    /// Returns the authorized client for `tenant`, building it if needed.
    pub fn client_for(&self, tenant: &Tenant) -> ApiClient {
        let print = fingerprint(tenant);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, client)) = cache.get(&tenant.id) {
            if *cached == print {
                return client.clone();
            }
            debug!(tenant = %tenant.id, "Tenant connection changed, rebuilding client");
        }

        let driver = DriverRegistry::for_tenant(tenant);
        let client = driver.authorize(self.fetch.client(tenant.base_url()), tenant);
        cache.insert(tenant.id.clone(), (print, client.clone()));
        client
    }

    /// Drops the cached client of one tenant.
    pub fn invalidate(&self, tenant_id: &TenantId) -> bool {
        let removed = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tenant_id)
            .is_some();
        if removed {
            debug!(tenant = %tenant_id, "Invalidated client");
        }
        removed
    }

    /// Drops every cached client.
    pub fn invalidate_all(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no client is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tallybar_core::PlatformType;
    use tallybar_fetch::{FetchSettings, Transport};

    use super::*;
    use crate::driver::PlatformDriver;
    use crate::testing::ScriptedTransport;

    fn manager() -> (Arc<ScriptedTransport>, ClientManager) {
        let transport = ScriptedTransport::new();
        transport.on("/api/user/self", json!({"success": true, "data": {}}));
        let fetch = FetchContext::with_transport(
            Arc::clone(&transport) as Arc<dyn Transport>,
            FetchSettings::default(),
        );
        (transport, ClientManager::new(fetch))
    }

    #[test]
    fn test_reuses_client_until_changed() {
        let (_, manager) = manager();
        let mut tenant = Tenant::new("a", "https://api.example", "k1", PlatformType::NewApi);

        let first = manager.client_for(&tenant);
        let again = manager.client_for(&tenant);
        assert!(Arc::ptr_eq(first.limiter(), again.limiter()));
        assert_eq!(manager.len(), 1);

        tenant.token = "k2".to_string();
        manager.client_for(&tenant);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_rebuilt_client_uses_new_credential() {
        let (transport, manager) = manager();
        let mut tenant = Tenant::new("a", "https://api.example", "k1", PlatformType::OneApi);
        manager.client_for(&tenant);

        tenant.token = "k2".to_string();
        let client = manager.client_for(&tenant);
        DriverRegistry::for_tenant(&tenant)
            .fetch_balance(&client)
            .await
            .unwrap();

        assert_eq!(transport.requests()[0].headers["Authorization"], "Bearer k2");
    }

    #[test]
    fn test_invalidate() {
        let (_, manager) = manager();
        let a = Tenant::new("a", "https://a.example", "k", PlatformType::NewApi);
        let b = Tenant::new("b", "https://b.example", "k", PlatformType::NewApi);
        manager.client_for(&a);
        manager.client_for(&b);

        assert!(manager.invalidate(&a.id));
        assert!(!manager.invalidate(&a.id));
        assert_eq!(manager.len(), 1);

        manager.invalidate_all();
        assert!(manager.is_empty());
    }
}
