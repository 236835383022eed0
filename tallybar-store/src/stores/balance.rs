//! Balance per tenant.

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tallybar_core::{Balance, TenantId};

use super::TenantScoped;
use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "balances";
const FIELDS: &[&str] = &["balances", "updated_at"];

/// Persisted balance state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceState {
    /// Latest balance per tenant.
    pub balances: HashMap<TenantId, Balance>,
    /// When each balance was fetched.
    pub updated_at: HashMap<TenantId, DateTime<Utc>>,
}

/// Store of tenant balances.
#[derive(Debug, Clone)]
pub struct BalanceStore {
    inner: PersistedStore<BalanceState>,
}

impl Deref for BalanceStore {
    type Target = PersistedStore<BalanceState>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl BalanceStore {
    /// Creates the store over `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, BalanceState::default()),
        }
    }

    /// Balance of one tenant.
    pub fn get(&self, tenant_id: &TenantId) -> Option<Balance> {
        self.read(|s| s.balances.get(tenant_id).copied())
    }

    /// When the tenant's balance was last written.
    pub fn updated_at(&self, tenant_id: &TenantId) -> Option<DateTime<Utc>> {
        self.read(|s| s.updated_at.get(tenant_id).copied())
    }

    /// All balances.
    pub fn all(&self) -> HashMap<TenantId, Balance> {
        self.read(|s| s.balances.clone())
    }

    /// Records a freshly fetched balance.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set(&self, tenant_id: &TenantId, balance: Balance) -> Result<(), StoreError> {
        self.mutate(FIELDS, |s| {
            s.balances.insert(tenant_id.clone(), balance);
            s.updated_at.insert(tenant_id.clone(), Utc::now());
        })
        .await
    }
}

#[async_trait]
impl TenantScoped for BalanceStore {
    fn scope_name(&self) -> &'static str {
        KEY
    }

    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        if self.get(tenant_id).is_none() {
            return Ok(false);
        }
        self.mutate(FIELDS, |s| {
            s.updated_at.remove(tenant_id);
            s.balances.remove(tenant_id).is_some()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kv::{KeyValueStore, MemoryKeyValueStore};

    #[tokio::test]
    async fn test_set_and_remove() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = BalanceStore::new(kv.clone());
        store.wait_ready().await;

        let id = "t1".to_string();
        store.set(&id, Balance::new(10.0, 5.0)).await.unwrap();
        assert_eq!(store.get(&id), Some(Balance::new(10.0, 5.0)));
        assert!(store.updated_at(&id).is_some());

        let persisted = kv.get(KEY).await.unwrap().unwrap();
        assert!(persisted["balances"]["t1"].is_object());

        assert!(store.remove_tenant(&id).await.unwrap());
        assert!(!store.remove_tenant(&id).await.unwrap());
        assert!(store.all().is_empty());
    }
}
