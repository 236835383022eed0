//! Tenant lifecycle watcher.
//!
//! When a tenant disappears from the tenant store, its per-tenant data is
//! removed from every other store and its cached client is dropped. A change
//! of the selected tenant clears the session's analytics cache.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tallybar_core::TenantId;
use tallybar_store::StoreError;
use tracing::{debug, info, warn};

use super::{BackgroundModule, Cleanup};
use crate::context::AppContext;
use crate::error::EngineError;
use crate::router::MessageRouter;

/// Watches the tenant store.
#[derive(Debug, Clone)]
pub struct TenantWatchModule {
    ctx: AppContext,
}

impl TenantWatchModule {
    /// Creates the module.
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Removes everything stored for `tenant_id` outside the tenant store.
    /// Returns the stores that failed.
    pub async fn cascade_removal(&self, tenant_id: &TenantId) -> Vec<(&'static str, StoreError)> {
        if self.ctx.clients.invalidate(tenant_id) {
            debug!(tenant = %tenant_id, "Dropped cached client");
        }
        let failures = self.ctx.stores.remove_tenant_data(tenant_id).await;
        for (store, e) in &failures {
            warn!(tenant = %tenant_id, store, error = %e, "Failed to remove tenant data");
        }
        info!(tenant = %tenant_id, "Removed tenant data");
        failures
    }
}

#[async_trait]
impl BackgroundModule for TenantWatchModule {
    fn name(&self) -> &'static str {
        "tenant-watch"
    }

    async fn init(&self, _router: &Arc<MessageRouter>) -> Result<Cleanup, EngineError> {
        let tenants = &self.ctx.stores.tenants;

        let module = self.clone();
        let mut known: HashSet<TenantId> = tenants.read(|s| s.tenants.iter().map(|t| t.id.clone()).collect());
        let on_tenants = tenants.on_change(
            |s| s.tenants.iter().map(|t| t.id.clone()).collect::<HashSet<_>>(),
            move |current| {
                for removed in known.difference(current) {
                    let module = module.clone();
                    let tenant_id = removed.clone();
                    tokio::spawn(async move {
                        module.cascade_removal(&tenant_id).await;
                    });
                }
                known.clone_from(current);
            },
        );

        let analytics = self.ctx.stores.analytics.clone();
        let on_selected = tenants.on_change(
            |s| s.selected.clone(),
            move |selected| {
                debug!(selected = ?selected, "Selected tenant changed, clearing analytics cache");
                let analytics = analytics.clone();
                tokio::spawn(async move {
                    if let Err(e) = analytics.clear_cache().await {
                        warn!(error = %e, "Failed to clear analytics cache");
                    }
                });
            },
        );

        Ok(Box::new(move || {
            drop(on_tenants);
            drop(on_selected);
        }))
    }
}
