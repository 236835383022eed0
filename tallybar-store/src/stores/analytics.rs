//! Analytics view state and its per-period cache.
//!
//! Lives in session scope. The live view (`snapshot`, `status`,
//! `refreshing`) is transient; only `cache` is persisted so another context
//! of the same session can serve a period without refetching.

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tallybar_core::{AnalyticsSnapshot, AnalyticsStatus, Period, TenantId};

use super::TenantScoped;
use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "analytics";
const FIELDS: &[&str] = &["cache"];

/// A cached snapshot for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    /// Tenant the snapshot was computed for.
    pub tenant_id: TenantId,
    /// The snapshot.
    pub snapshot: AnalyticsSnapshot,
    /// When it was computed.
    pub cached_at: DateTime<Utc>,
}

/// Analytics view state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsState {
    /// What the view shows. Never partially defined.
    pub snapshot: AnalyticsSnapshot,
    /// Loading state.
    pub status: AnalyticsStatus,
    /// A cached snapshot is shown while a refresh runs.
    pub refreshing: bool,
    /// Cached snapshots by period.
    pub cache: HashMap<Period, CachedSnapshot>,
}

/// Store of the analytics view.
#[derive(Debug, Clone)]
pub struct AnalyticsStore {
    inner: PersistedStore<AnalyticsState>,
}

impl Deref for AnalyticsStore {
    type Target = PersistedStore<AnalyticsState>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AnalyticsStore {
    /// Creates the store over a session-scoped `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, AnalyticsState::default()),
        }
    }

    /// The displayed snapshot.
    pub fn snapshot_view(&self) -> AnalyticsSnapshot {
        self.read(|s| s.snapshot.clone())
    }

    /// Current status.
    pub fn status(&self) -> AnalyticsStatus {
        self.read(|s| s.status.clone())
    }

    /// Whether a background refresh of a cached snapshot is running.
    pub fn is_refreshing(&self) -> bool {
        self.read(|s| s.refreshing)
    }

    /// The cache entry for `period` if it belongs to `tenant_id`.
    pub fn cached(&self, period: Period, tenant_id: &TenantId) -> Option<CachedSnapshot> {
        self.read(|s| {
            s.cache
                .get(&period)
                .filter(|entry| &entry.tenant_id == tenant_id)
                .cloned()
        })
    }

    /// Enters the loading state for a period with nothing cached.
    pub fn begin_loading(&self, period: Period) {
        self.mutate_transient(|s| {
            s.snapshot = AnalyticsSnapshot::empty(period);
            s.status = AnalyticsStatus::Loading;
            s.refreshing = false;
        });
    }

    /// Shows a cached snapshot while it is being refreshed.
    pub fn show_cached(&self, cached: &CachedSnapshot) {
        self.mutate_transient(|s| {
            s.snapshot = cached.snapshot.clone();
            s.status = AnalyticsStatus::Ready;
            s.refreshing = true;
        });
    }

    /// Publishes a fresh snapshot and caches it.
    ///
    /// # Errors
    ///
    /// Returns the backend error. The view is updated regardless.
    pub async fn complete(
        &self,
        tenant_id: &TenantId,
        snapshot: AnalyticsSnapshot,
    ) -> Result<(), StoreError> {
        self.mutate(FIELDS, |s| {
            s.cache.insert(
                snapshot.period,
                CachedSnapshot {
                    tenant_id: tenant_id.clone(),
                    snapshot: snapshot.clone(),
                    cached_at: Utc::now(),
                },
            );
            s.snapshot = snapshot;
            s.status = AnalyticsStatus::Ready;
            s.refreshing = false;
        })
        .await
    }

    /// Records a failed refresh and resets the view to the empty baseline.
    pub fn fail(&self, period: Period, message: impl Into<String>) {
        let message = message.into();
        self.mutate_transient(|s| {
            s.snapshot = AnalyticsSnapshot::empty(period);
            s.status = AnalyticsStatus::Error(message);
            s.refreshing = false;
        });
    }

    /// Drops every cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        if self.read(|s| s.cache.is_empty()) {
            return Ok(());
        }
        self.mutate(FIELDS, |s| s.cache.clear()).await
    }
}

#[async_trait]
impl TenantScoped for AnalyticsStore {
    fn scope_name(&self) -> &'static str {
        KEY
    }

    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        if !self.read(|s| s.cache.values().any(|e| &e.tenant_id == tenant_id)) {
            return Ok(false);
        }
        self.mutate(FIELDS, |s| {
            let before = s.cache.len();
            s.cache.retain(|_, entry| &entry.tenant_id != tenant_id);
            before != s.cache.len()
        })
        .await
    }
}
