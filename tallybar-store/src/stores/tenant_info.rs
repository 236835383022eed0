//! Platform display information per tenant.

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tallybar_core::{TenantId, TenantInfo};

use super::TenantScoped;
use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "tenant_info";
const FIELDS: &[&str] = &["info"];

/// Persisted tenant info state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantInfoState {
    /// Info per tenant.
    pub info: HashMap<TenantId, TenantInfo>,
}

/// Store of tenant platform info.
#[derive(Debug, Clone)]
pub struct TenantInfoStore {
    inner: PersistedStore<TenantInfoState>,
}

impl Deref for TenantInfoStore {
    type Target = PersistedStore<TenantInfoState>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TenantInfoStore {
    /// Creates the store over `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, TenantInfoState::default()),
        }
    }

    /// Info of one tenant, if fetched.
    pub fn get(&self, tenant_id: &TenantId) -> Option<TenantInfo> {
        self.read(|s| s.info.get(tenant_id).cloned())
    }

    /// Info of one tenant, or the platform defaults.
    pub fn get_or_default(&self, tenant_id: &TenantId) -> TenantInfo {
        self.get(tenant_id).unwrap_or_default()
    }

    /// Records freshly fetched info.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set(&self, tenant_id: &TenantId, info: TenantInfo) -> Result<(), StoreError> {
        self.mutate(FIELDS, |s| {
            s.info.insert(tenant_id.clone(), info);
        })
        .await
    }
}

#[async_trait]
impl TenantScoped for TenantInfoStore {
    fn scope_name(&self) -> &'static str {
        KEY
    }

    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        if self.get(tenant_id).is_none() {
            return Ok(false);
        }
        self.mutate(FIELDS, |s| s.info.remove(tenant_id).is_some())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tallybar_core::DEFAULT_CREDIT_UNIT;

    use super::*;
    use crate::kv::MemoryKeyValueStore;

    #[tokio::test]
    async fn test_defaults_until_fetched() {
        let store = TenantInfoStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.wait_ready().await;
        let id = "t1".to_string();

        assert!(store.get(&id).is_none());
        assert!((store.get_or_default(&id).credit_unit - DEFAULT_CREDIT_UNIT).abs() < f64::EPSILON);

        let info = TenantInfo {
            credit_unit: 1000.0,
            ..Default::default()
        };
        store.set(&id, info).await.unwrap();
        assert!((store.get_or_default(&id).credit_unit - 1000.0).abs() < f64::EPSILON);
    }
}
