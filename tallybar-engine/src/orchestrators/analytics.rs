//! Analytics orchestrator.
//!
//! Stale-while-revalidate: a cached snapshot for the requested period is
//! published immediately (`Ready`, `refreshing`) and replaced once the
//! refresh lands. Without a cache entry the view shows `Loading`. Failures
//! never escape; they reset the view to the empty baseline with an error
//! status.

use std::sync::Arc;

use tallybar_core::{AnalyticsSnapshot, Balance, Cost, Period, Tenant};
use tallybar_providers::ClientManager;
use tallybar_store::{AnalyticsStore, TenantInfoStore};
use tracing::{debug, info, instrument, warn};

use super::resolve;
use crate::analytics::build_snapshot;
use crate::context::AppContext;
use crate::error::EngineError;

/// Computes analytics snapshots.
#[derive(Debug, Clone)]
pub struct AnalyticsOrchestrator {
    clients: Arc<ClientManager>,
    store: AnalyticsStore,
    tenant_info: TenantInfoStore,
    max_points: usize,
}

impl AnalyticsOrchestrator {
    /// Creates the orchestrator.
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            clients: Arc::clone(&ctx.clients),
            store: ctx.stores.analytics.clone(),
            tenant_info: ctx.stores.tenant_info.clone(),
            max_points: ctx.config.analytics.max_points,
        }
    }

    /// Refreshes the snapshot of `period` and returns what the view shows
    /// afterwards.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, period = %period))]
    pub async fn refresh(&self, tenant: &Tenant, period: Period) -> AnalyticsSnapshot {
        match self.store.cached(period, &tenant.id) {
            Some(cached) => {
                debug!(cached_at = %cached.cached_at, "Serving cached snapshot while refreshing");
                self.store.show_cached(&cached);
            }
            None => self.store.begin_loading(period),
        }

        match self.compute(tenant, period).await {
            Ok(snapshot) => {
                if let Err(e) = self.store.complete(&tenant.id, snapshot.clone()).await {
                    warn!(error = %e, "Failed to cache analytics snapshot");
                }
                info!(
                    points = snapshot.series.len(),
                    models = snapshot.models.len(),
                    total = snapshot.summary.total_cost,
                    "Refreshed analytics"
                );
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "Analytics refresh failed");
                self.store
                    .fail(period, e.user_message().unwrap_or_else(|| e.to_string()));
                AnalyticsSnapshot::empty(period)
            }
        }
    }

    async fn compute(&self, tenant: &Tenant, period: Period) -> Result<AnalyticsSnapshot, EngineError> {
        let (driver, client) = resolve(&self.clients, tenant);

        let (balance, costs, tenant_info) = tokio::join!(
            driver.fetch_balance(&client),
            driver.fetch_costs(&client, period),
            driver.fetch_tenant_info(&client),
        );
        let balance: Balance = balance?;
        let costs: Vec<Cost> = costs?;

        match tenant_info {
            Ok(tenant_info) => {
                if let Err(e) = self.tenant_info.set(&tenant.id, tenant_info).await {
                    debug!(error = %e, "Failed to store tenant info");
                }
            }
            Err(e) => debug!(error = %e, "Tenant info unavailable, keeping cached"),
        }

        Ok(build_snapshot(period, balance, &costs, self.max_points))
    }
}
