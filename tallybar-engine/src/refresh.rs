//! Full-tenant refresh.
//!
//! Refreshes balance, today's costs and tenant info of one tenant
//! concurrently, or of every registered tenant. Each domain reports its own
//! outcome; one failing domain or tenant never stops the others.

use futures::future::join_all;
use tallybar_core::{Balance, Cost, Period, Tenant, TenantId, TenantInfo};
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::EngineError;
use crate::orchestrators::{BalanceOrchestrator, CostOrchestrator, TenantInfoOrchestrator};

/// Outcome of refreshing one tenant.
#[derive(Debug)]
pub struct TenantRefresh {
    /// Tenant id.
    pub tenant_id: TenantId,
    /// Tenant name.
    pub tenant_name: String,
    /// Balance refresh.
    pub balance: Result<Balance, EngineError>,
    /// Today's costs.
    pub costs: Result<Vec<Cost>, EngineError>,
    /// Tenant info refresh.
    pub tenant_info: Result<TenantInfo, EngineError>,
}

impl TenantRefresh {
    /// Returns true if every domain refreshed.
    pub fn is_ok(&self) -> bool {
        self.balance.is_ok() && self.costs.is_ok() && self.tenant_info.is_ok()
    }

    /// Errors of the failed domains, labelled.
    pub fn errors(&self) -> Vec<(&'static str, &EngineError)> {
        let mut errors = Vec::new();
        if let Err(e) = &self.balance {
            errors.push(("balance", e));
        }
        if let Err(e) = &self.costs {
            errors.push(("costs", e));
        }
        if let Err(e) = &self.tenant_info {
            errors.push(("tenant_info", e));
        }
        errors
    }
}

/// Runs full refreshes.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    ctx: AppContext,
    balance: BalanceOrchestrator,
    cost: CostOrchestrator,
    tenant_info: TenantInfoOrchestrator,
}

impl RefreshCoordinator {
    /// Creates the coordinator.
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            ctx: ctx.clone(),
            balance: BalanceOrchestrator::new(ctx),
            cost: CostOrchestrator::new(ctx),
            tenant_info: TenantInfoOrchestrator::new(ctx),
        }
    }

    /// Refreshes one tenant.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn refresh_tenant(&self, tenant: &Tenant) -> TenantRefresh {
        let (balance, costs, tenant_info) = tokio::join!(
            self.balance.refresh(tenant),
            self.cost.refresh(tenant, Period::OneDay),
            self.tenant_info.refresh(tenant),
        );
        let outcome = TenantRefresh {
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.clone(),
            balance,
            costs,
            tenant_info,
        };
        for (domain, e) in outcome.errors() {
            if !e.is_silent() {
                warn!(domain, error = %e, "Refresh failed");
            }
        }
        outcome
    }

    /// Refreshes every registered tenant.
    pub async fn refresh_all(&self) -> Vec<TenantRefresh> {
        let tenants = self.ctx.stores.tenants.list();
        let outcomes = join_all(tenants.iter().map(|t| self.refresh_tenant(t))).await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(tenants = outcomes.len(), failed, "Refreshed all tenants");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{MockPlatform, add_tenant, context};

    #[tokio::test]
    async fn test_domains_fail_independently() {
        let platform = MockPlatform::new();
        platform
            .on(
                "/api/user/self",
                json!({"success": true, "data": {"quota": 10, "used_quota": 5}}),
            )
            .fail("/api/data/self", 500)
            .on("/api/status", json!({"success": true, "data": {}}));
        let ctx = context(&platform).await;
        add_tenant(&ctx, "one").await;
        add_tenant(&ctx, "two").await;

        let outcomes = RefreshCoordinator::new(&ctx).refresh_all().await;
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            assert!(outcome.balance.is_ok());
            assert!(outcome.tenant_info.is_ok());
            assert!(!outcome.is_ok());
            assert_eq!(outcome.errors()[0].0, "costs");
            assert!(ctx.stores.balances.get(&outcome.tenant_id).is_some());
        }
    }
}
