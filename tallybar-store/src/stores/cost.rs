//! Costs per tenant and period.

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tallybar_core::{Cost, Period, TenantId};

use super::TenantScoped;
use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "costs";
const FIELDS: &[&str] = &["costs"];

/// Persisted cost state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostState {
    /// Cost entries per tenant, then per period.
    pub costs: HashMap<TenantId, HashMap<Period, Vec<Cost>>>,
}

/// Store of tenant costs.
#[derive(Debug, Clone)]
pub struct CostStore {
    inner: PersistedStore<CostState>,
}

impl Deref for CostStore {
    type Target = PersistedStore<CostState>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl CostStore {
    /// Creates the store over `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, CostState::default()),
        }
    }

    /// Costs of one tenant for one period. Empty if never fetched.
    pub fn get(&self, tenant_id: &TenantId, period: Period) -> Vec<Cost> {
        self.read(|s| {
            s.costs
                .get(tenant_id)
                .and_then(|periods| periods.get(&period))
                .cloned()
                .unwrap_or_default()
        })
    }

    /// Sum of `credit_cost` for one tenant and period.
    pub fn total(&self, tenant_id: &TenantId, period: Period) -> f64 {
        self.read(|s| {
            s.costs
                .get(tenant_id)
                .and_then(|periods| periods.get(&period))
                .map_or(0.0, |costs| Cost::total_credit(costs))
        })
    }

    /// Replaces the entries of one tenant and period.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set(
        &self,
        tenant_id: &TenantId,
        period: Period,
        costs: Vec<Cost>,
    ) -> Result<(), StoreError> {
        self.mutate(FIELDS, |s| {
            s.costs
                .entry(tenant_id.clone())
                .or_default()
                .insert(period, costs);
        })
        .await
    }
}

#[async_trait]
impl TenantScoped for CostStore {
    fn scope_name(&self) -> &'static str {
        KEY
    }

    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        if !self.read(|s| s.costs.contains_key(tenant_id)) {
            return Ok(false);
        }
        self.mutate(FIELDS, |s| s.costs.remove(tenant_id).is_some())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kv::MemoryKeyValueStore;

    #[tokio::test]
    async fn test_set_replaces_wholesale() {
        let kv: SharedKeyValueStore = Arc::new(MemoryKeyValueStore::new());
        let store = CostStore::new(kv.clone());
        store.wait_ready().await;
        let id = "t1".to_string();

        store
            .set(
                &id,
                Period::OneDay,
                vec![Cost::new("a", 1.0, 10), Cost::new("b", 2.0, 20)],
            )
            .await
            .unwrap();
        store
            .set(&id, Period::SevenDays, vec![Cost::new("a", 9.0, 90)])
            .await
            .unwrap();
        store
            .set(&id, Period::OneDay, vec![Cost::new("c", 4.0, 40)])
            .await
            .unwrap();

        assert_eq!(store.get(&id, Period::OneDay).len(), 1);
        assert!((store.total(&id, Period::OneDay) - 4.0).abs() < f64::EPSILON);
        assert!((store.total(&id, Period::SevenDays) - 9.0).abs() < f64::EPSILON);

        // period keys survive the JSON round trip
        let reopened = CostStore::new(kv);
        reopened.wait_ready().await;
        assert_eq!(reopened.get(&id, Period::SevenDays).len(), 1);
    }

    #[tokio::test]
    async fn test_remove_tenant() {
        let store = CostStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.wait_ready().await;
        let id = "t1".to_string();
        store.set(&id, Period::OneDay, vec![]).await.unwrap();

        assert!(store.remove_tenant(&id).await.unwrap());
        assert!(!store.remove_tenant(&id).await.unwrap());
        assert!((store.total(&id, Period::OneDay)).abs() < f64::EPSILON);
    }
}
