//! Tenant list and selection.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tallybar_core::{CoreError, Tenant, TenantId};
use tracing::info;

use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "tenants";
const FIELDS: &[&str] = &["tenants", "selected"];

/// Persisted tenant state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantState {
    /// Registered tenants, in insertion order.
    pub tenants: Vec<Tenant>,
    /// The selected tenant.
    pub selected: Option<TenantId>,
}

impl TenantState {
    fn position(&self, id: &TenantId) -> Option<usize> {
        self.tenants.iter().position(|t| &t.id == id)
    }

    /// Fails if another tenant already owns `tenant`'s `(url, user_id)`.
    fn check_unique(&self, tenant: &Tenant) -> Result<(), CoreError> {
        let key = tenant.dedup_key();
        let clash = self
            .tenants
            .iter()
            .any(|t| t.id != tenant.id && t.dedup_key() == key);
        if clash {
            let (url, user_id) = key;
            return Err(CoreError::DuplicateTenant {
                url,
                user_id: if user_id.is_empty() { "-".to_string() } else { user_id },
            });
        }
        Ok(())
    }
}

/// Store of registered tenants.
#[derive(Debug, Clone)]
pub struct TenantStore {
    inner: PersistedStore<TenantState>,
}

impl Deref for TenantStore {
    type Target = PersistedStore<TenantState>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TenantStore {
    /// Creates the store over `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, TenantState::default()),
        }
    }

    /// All tenants.
    pub fn list(&self) -> Vec<Tenant> {
        self.read(|s| s.tenants.clone())
    }

    /// Looks up one tenant.
    pub fn get(&self, id: &TenantId) -> Option<Tenant> {
        self.read(|s| s.tenants.iter().find(|t| &t.id == id).cloned())
    }

    /// The selected tenant id.
    pub fn selected_id(&self) -> Option<TenantId> {
        self.read(|s| s.selected.clone())
    }

    /// The selected tenant.
    pub fn selected(&self) -> Option<Tenant> {
        self.read(|s| {
            let id = s.selected.as_ref()?;
            s.tenants.iter().find(|t| &t.id == id).cloned()
        })
    }

    /// Registers a tenant. The first tenant becomes the selection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for invalid fields,
    /// [`CoreError::DuplicateTenant`] if `(url, user_id)` is taken, or the
    /// backend error.
    pub async fn add(&self, tenant: Tenant) -> Result<Tenant, StoreError> {
        tenant.validate()?;
        let added = self
            .mutate(FIELDS, |s| {
                s.check_unique(&tenant)?;
                if s.selected.is_none() {
                    s.selected = Some(tenant.id.clone());
                }
                s.tenants.push(tenant.clone());
                Ok::<_, CoreError>(tenant)
            })
            .await??;
        info!(tenant = %added.id, name = %added.name, "Added tenant");
        Ok(added)
    }

    /// Replaces an existing tenant in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TenantNotFound`] for an unknown id, the
    /// validation or uniqueness errors of [`add`](Self::add), or the backend
    /// error.
    pub async fn update(&self, tenant: Tenant) -> Result<(), StoreError> {
        tenant.validate()?;
        self.mutate(&["tenants"], |s| {
            let index = s
                .position(&tenant.id)
                .ok_or_else(|| CoreError::TenantNotFound(tenant.id.clone()))?;
            s.check_unique(&tenant)?;
            s.tenants[index] = tenant;
            Ok::<_, CoreError>(())
        })
        .await??;
        Ok(())
    }

    /// Removes a tenant. If it was selected, the first remaining tenant is
    /// selected instead.
    ///
    /// Returns the removed tenant, or `None` if the id was unknown.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn remove(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        let removed = self
            .mutate(FIELDS, |s| {
                let index = s.position(id)?;
                let removed = s.tenants.remove(index);
                if s.selected.as_ref() == Some(id) {
                    s.selected = s.tenants.first().map(|t| t.id.clone());
                }
                Some(removed)
            })
            .await?;
        if let Some(tenant) = &removed {
            info!(tenant = %tenant.id, name = %tenant.name, "Removed tenant");
        }
        Ok(removed)
    }

    /// Selects a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TenantNotFound`] for an unknown id, or the
    /// backend error.
    pub async fn select(&self, id: &TenantId) -> Result<(), StoreError> {
        if self.get(id).is_none() {
            return Err(CoreError::TenantNotFound(id.clone()).into());
        }
        self.mutate(&["selected"], |s| s.selected = Some(id.clone()))
            .await
    }
}
