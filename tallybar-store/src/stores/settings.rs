//! Process-wide user settings.
//!
//! Alert thresholds are stored in raw quota units. `alerted_today` records
//! the local date of the last usage alert per tenant, which is what limits
//! alerts to one per tenant per day.

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tallybar_core::{TenantId, TenantSortConfig};
use tracing::debug;

use super::TenantScoped;
use crate::error::StoreError;
use crate::kv::SharedKeyValueStore;
use crate::persisted::PersistedStore;

const KEY: &str = "settings";
const FIELDS: &[&str] = &[
    "daily_usage_alert",
    "alerted_today",
    "experimental",
    "tenant_sort",
    "badge",
];

// ============================================================================
// Settings Types
// ============================================================================

/// Daily usage alert of one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageAlertConfig {
    /// Whether the alert is armed.
    pub enabled: bool,
    /// Threshold in raw quota units.
    pub threshold: f64,
}

/// Experimental feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentalFlags {
    /// Analytics dashboard.
    pub analytics: bool,
    /// Token management view.
    pub token_management: bool,
}

/// Toolbar badge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    /// Whether the badge is shown.
    pub enabled: bool,
    /// Tenant whose balance is shown.
    pub tenant_id: Option<TenantId>,
}

/// User preferences.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Usage alert per tenant.
    pub daily_usage_alert: HashMap<TenantId, UsageAlertConfig>,
    /// Local date (`YYYY-MM-DD`) of the last alert per tenant.
    pub alerted_today: HashMap<TenantId, String>,
    /// Feature flags.
    pub experimental: ExperimentalFlags,
    /// Tenant list ordering.
    pub tenant_sort: TenantSortConfig,
    /// Toolbar badge.
    pub badge: BadgeConfig,
}

// ============================================================================
// Settings Store
// ============================================================================

/// Persistent settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: PersistedStore<Settings>,
}

impl Deref for SettingsStore {
    type Target = PersistedStore<Settings>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl SettingsStore {
    /// Creates the store over `kv`.
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self {
            inner: PersistedStore::new(kv, KEY, FIELDS, Settings::default()),
        }
    }

    /// Current settings.
    pub fn get(&self) -> Settings {
        self.snapshot()
    }

    // ------------------------------------------------------------------------
    // Usage alerts
    // ------------------------------------------------------------------------

    /// Alert configuration of one tenant.
    pub fn alert_config(&self, tenant_id: &TenantId) -> Option<UsageAlertConfig> {
        self.read(|s| s.daily_usage_alert.get(tenant_id).copied())
    }

    /// Tenants with an armed alert.
    pub fn enabled_alerts(&self) -> Vec<(TenantId, UsageAlertConfig)> {
        let mut alerts: Vec<_> = self.read(|s| {
            s.daily_usage_alert
                .iter()
                .filter(|(_, config)| config.enabled)
                .map(|(id, config)| (id.clone(), *config))
                .collect()
        });
        alerts.sort_by(|a, b| a.0.cmp(&b.0));
        alerts
    }

    /// Arms the alert of one tenant at `threshold` raw quota units.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set_alert(&self, tenant_id: &TenantId, threshold: f64) -> Result<(), StoreError> {
        self.mutate(&["daily_usage_alert"], |s| {
            s.daily_usage_alert.insert(
                tenant_id.clone(),
                UsageAlertConfig {
                    enabled: true,
                    threshold: threshold.max(0.0),
                },
            );
        })
        .await
    }

    /// Disarms the alert of one tenant, keeping its threshold.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn disable_alert(&self, tenant_id: &TenantId) -> Result<(), StoreError> {
        self.mutate(&["daily_usage_alert"], |s| {
            if let Some(config) = s.daily_usage_alert.get_mut(tenant_id) {
                config.enabled = false;
            }
        })
        .await
    }

    /// Returns whether the tenant was already alerted on `today`.
    pub fn alerted_on(&self, tenant_id: &TenantId, today: NaiveDate) -> bool {
        let today = today.to_string();
        self.read(|s| s.alerted_today.get(tenant_id) == Some(&today))
    }

    /// Records that the tenant was alerted on `today`.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn mark_alerted(&self, tenant_id: &TenantId, today: NaiveDate) -> Result<(), StoreError> {
        self.mutate(&["alerted_today"], |s| {
            s.alerted_today.insert(tenant_id.clone(), today.to_string());
        })
        .await
    }

    /// Drops every alert date other than `today`. Returns how many were
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn clear_stale_alerts(&self, today: NaiveDate) -> Result<usize, StoreError> {
        let today = today.to_string();
        let stale = self.read(|s| s.alerted_today.values().filter(|d| **d != today).count());
        if stale == 0 {
            return Ok(0);
        }
        let cleared = self
            .mutate(&["alerted_today"], |s| {
                let before = s.alerted_today.len();
                s.alerted_today.retain(|_, date| *date == today);
                before - s.alerted_today.len()
            })
            .await?;
        debug!(cleared, "Cleared stale alert dates");
        Ok(cleared)
    }

    // ------------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------------

    /// Replaces the tenant sort configuration.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set_sort(&self, sort: TenantSortConfig) -> Result<(), StoreError> {
        self.mutate(&["tenant_sort"], |s| s.tenant_sort = sort).await
    }

    /// Replaces the badge configuration.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set_badge(&self, badge: BadgeConfig) -> Result<(), StoreError> {
        self.mutate(&["badge"], |s| s.badge = badge).await
    }

    /// Replaces the feature flags.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set_experimental(&self, flags: ExperimentalFlags) -> Result<(), StoreError> {
        self.mutate(&["experimental"], |s| s.experimental = flags).await
    }
}

#[async_trait]
impl TenantScoped for SettingsStore {
    fn scope_name(&self) -> &'static str {
        KEY
    }

    async fn remove_tenant(&self, tenant_id: &TenantId) -> Result<bool, StoreError> {
        let present = self.read(|s| {
            s.daily_usage_alert.contains_key(tenant_id)
                || s.alerted_today.contains_key(tenant_id)
                || s.tenant_sort.manual_order.contains(tenant_id)
                || s.badge.tenant_id.as_ref() == Some(tenant_id)
        });
        if !present {
            return Ok(false);
        }
        self.mutate(
            &["daily_usage_alert", "alerted_today", "tenant_sort", "badge"],
            |s| {
                s.daily_usage_alert.remove(tenant_id);
                s.alerted_today.remove(tenant_id);
                s.tenant_sort.manual_order.retain(|id| id != tenant_id);
                if s.badge.tenant_id.as_ref() == Some(tenant_id) {
                    s.badge.tenant_id = None;
                }
                true
            },
        )
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
