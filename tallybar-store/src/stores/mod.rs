//! Domain stores.
//!
//! Each store wraps a [`PersistedStore`](crate::PersistedStore) bound to one
//! key and exposes domain actions on top of it. Per-tenant stores implement
//! [`TenantScoped`] so a tenant deletion can be cascaded through all of them.

pub mod analytics;
pub mod balance;
pub mod cost;
pub mod settings;
pub mod tenant;
pub mod tenant_info;
pub mod token;

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tallybar_core::TenantId;

use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;

pub use analytics::{AnalyticsState, AnalyticsStore, CachedSnapshot};
pub use balance::{BalanceState, BalanceStore};
pub use cost::{CostState, CostStore};
pub use settings::{BadgeConfig, ExperimentalFlags, Settings, SettingsStore, UsageAlertConfig};
pub use tenant::{TenantState, TenantStore};
pub use tenant_info::{TenantInfoState, TenantInfoStore};
pub use token::{TokenState, TokenStore};

/// A store holding entries keyed by tenant id.
#[async_trait]
pub trait TenantScoped: Send + Sync {
    /// Storage key, for logging.
    fn scope_name(&self) -> &'static str;

    /// Drops every entry of `tenant_id`. Returns whether anything was removed.
    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError>;
}

/// Every store of one execution context.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Tenant list and selection.
    pub tenants: TenantStore,
    /// Balances per tenant.
    pub balances: BalanceStore,
    /// Costs per tenant and period.
    pub costs: CostStore,
    /// Tokens and token groups per tenant.
    pub tokens: TokenStore,
    /// Platform info per tenant.
    pub tenant_info: TenantInfoStore,
    /// Process-wide settings.
    pub settings: SettingsStore,
    /// Analytics view and its session cache.
    pub analytics: AnalyticsStore,
}

impl Stores {
    /// Opens every store. `durable` backs all stores except analytics, which
    /// lives in `session`.
    pub fn open(durable: &SharedKeyValueStore, session: &SharedKeyValueStore) -> Self {
        Self {
            tenants: TenantStore::new(durable.clone()),
            balances: BalanceStore::new(durable.clone()),
            costs: CostStore::new(durable.clone()),
            tokens: TokenStore::new(durable.clone()),
            tenant_info: TenantInfoStore::new(durable.clone()),
            settings: SettingsStore::new(durable.clone()),
            analytics: AnalyticsStore::new(session.clone()),
        }
    }

    /// Stores holding per-tenant entries.
    pub fn tenant_scoped(&self) -> [&dyn TenantScoped; 6] {
        [
            &self.balances,
            &self.costs,
            &self.tokens,
            &self.tenant_info,
            &self.settings,
            &self.analytics,
        ]
    }

    /// Returns true once every store has hydrated.
    pub fn is_ready(&self) -> bool {
        self.tenants.is_ready()
            && self.balances.is_ready()
            && self.costs.is_ready()
            && self.tokens.is_ready()
            && self.tenant_info.is_ready()
            && self.settings.is_ready()
            && self.analytics.is_ready()
    }

    /// Waits for every store to hydrate, at most `timeout`. Returns whether
    /// they all did.
    pub async fn wait_ready_timeout(&self, timeout: Duration) -> bool {
        let waits = async {
            self.tenants.wait_ready().await;
            self.balances.wait_ready().await;
            self.costs.wait_ready().await;
            self.tokens.wait_ready().await;
            self.tenant_info.wait_ready().await;
            self.settings.wait_ready().await;
            self.analytics.wait_ready().await;
        };
        tokio::time::timeout(timeout, waits).await.is_ok()
    }

    /// Removes `tenant_id` from every tenant-scoped store.
    ///
    /// Each store is cleaned independently; one failing store does not stop
    /// the others. Returns the failures by store name.
    pub async fn remove_tenant_data(&self, tenant_id: &TenantId) -> Vec<(&'static str, StoreError)> {
        let scoped = self.tenant_scoped();
        let results = join_all(scoped.iter().map(|store| store.remove_tenant(tenant_id))).await;
        scoped
            .iter()
            .zip(results)
            .filter_map(|(store, result)| result.err().map(|e| (store.scope_name(), e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tallybar_core::{Balance, Cost, Period, PlatformType, Tenant, TenantInfo};

    use super::*;
    use crate::kv::MemoryKeyValueStore;

    fn open() -> Stores {
        let durable: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
        let session: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
        Stores::open(&durable, &session)
    }

    #[tokio::test]
    async fn test_remove_tenant_data_cascades() {
        let stores = open();
        assert!(stores.wait_ready_timeout(Duration::from_secs(1)).await);

        let tenant = Tenant::new("a", "https://a.example", "k", PlatformType::NewApi);
        let other = Tenant::new("b", "https://b.example", "k", PlatformType::NewApi);
        for t in [&tenant, &other] {
            stores.balances.set(&t.id, Balance::new(1.0, 2.0)).await.unwrap();
            stores
                .costs
                .set(&t.id, Period::OneDay, vec![Cost::new("m", 1.0, 1)])
                .await
                .unwrap();
            stores.tenant_info.set(&t.id, TenantInfo::default()).await.unwrap();
            stores.settings.set_alert(&t.id, 100.0).await.unwrap();
        }

        let failures = stores.remove_tenant_data(&tenant.id).await;
        assert!(failures.is_empty());

        assert!(stores.balances.get(&tenant.id).is_none());
        assert!(stores.costs.get(&tenant.id, Period::OneDay).is_empty());
        assert!(stores.tenant_info.get(&tenant.id).is_none());
        assert!(stores.settings.alert_config(&tenant.id).is_none());

        assert!(stores.balances.get(&other.id).is_some());
        assert_eq!(stores.costs.get(&other.id, Period::OneDay).len(), 1);
        assert!(stores.settings.alert_config(&other.id).is_some());
    }

    #[tokio::test]
    async fn test_wait_ready() {
        let stores = open();
        assert!(stores.wait_ready_timeout(Duration::from_secs(1)).await);
        assert!(stores.is_ready());
    }
}
