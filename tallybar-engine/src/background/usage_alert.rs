//! Daily usage alerts.
//!
//! Polls every tenant with an armed alert, sums today's cost entries and
//! posts one notification per tenant per local day once usage reaches the
//! threshold. The same check is reachable through `CHECK_USAGE_ALERT`
//! messages carrying a precomputed usage figure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Value, json};
use tallybar_core::{Cost, Period, TenantId, TenantInfo, format_quota};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::{BackgroundModule, Cleanup, RunGuard};
use crate::context::AppContext;
use crate::error::EngineError;
use crate::notify::{Notification, Notifier};
use crate::orchestrators::{CostOrchestrator, TenantInfoOrchestrator};
use crate::router::{CHECK_USAGE_ALERT, MessageRouter};

/// Usage figure of one tenant for today.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    /// Tenant id.
    pub tenant_id: TenantId,
    /// Display name used in the notification.
    #[serde(default)]
    pub tenant_name: Option<String>,
    /// Conversion info; the cached info is used when absent.
    #[serde(default)]
    pub tenant_info: Option<TenantInfo>,
    /// Today's usage in raw quota units.
    pub today_usage: f64,
}

/// The usage alert poller.
#[derive(Clone)]
pub struct UsageAlertModule {
    ctx: AppContext,
    notifier: Arc<dyn Notifier>,
    guard: RunGuard,
}

impl std::fmt::Debug for UsageAlertModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAlertModule").finish_non_exhaustive()
    }
}

impl UsageAlertModule {
    /// Creates the module.
    pub fn new(ctx: AppContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ctx,
            notifier,
            guard: RunGuard::default(),
        }
    }

    /// Runs one poll for the current local date.
    pub async fn check(&self) -> Vec<(TenantId, Result<bool, EngineError>)> {
        self.check_on(Local::now().date_naive()).await
    }

    /// Runs one poll as if today were `today`. Returns whether each armed
    /// tenant was notified; an overlapping call returns nothing.
    #[instrument(skip(self))]
    pub async fn check_on(&self, today: NaiveDate) -> Vec<(TenantId, Result<bool, EngineError>)> {
        let Some(_permit) = self.guard.try_start() else {
            debug!("Usage alert check already running, skipping");
            return Vec::new();
        };

        let timeout = self.ctx.config.general.hydration_timeout();
        if !self.ctx.stores.wait_ready_timeout(timeout).await {
            warn!(?timeout, "Stores not hydrated, checking with current state");
        }

        let settings = &self.ctx.stores.settings;
        if let Err(e) = settings.clear_stale_alerts(today).await {
            warn!(error = %e, "Failed to clear stale alert dates");
        }

        let alerts = settings.enabled_alerts();
        if alerts.is_empty() {
            return Vec::new();
        }
        debug!(tenants = alerts.len(), "Checking usage alerts");

        let checks = alerts.into_iter().map(|(tenant_id, _)| async move {
            let result = self.poll_tenant(&tenant_id, today).await;
            if let Err(e) = &result {
                if !e.is_silent() {
                    warn!(tenant = %tenant_id, error = %e, "Usage alert check failed");
                }
            }
            (tenant_id, result)
        });
        join_all(checks).await
    }

    async fn poll_tenant(&self, tenant_id: &TenantId, today: NaiveDate) -> Result<bool, EngineError> {
        let tenant = self.ctx.tenant(tenant_id)?;

        let info = TenantInfoOrchestrator::new(&self.ctx);
        let cost = CostOrchestrator::new(&self.ctx);
        let (tenant_info, costs) = tokio::join!(
            info.refresh(&tenant),
            cost.refresh(&tenant, Period::OneDay),
        );
        let tenant_info = tenant_info.unwrap_or_else(|e| {
            debug!(tenant = %tenant_id, error = %e, "Using cached tenant info");
            self.ctx.stores.tenant_info.get_or_default(tenant_id)
        });
        let today_usage = Cost::total_credit(&costs?);

        self.evaluate(
            UsageReport {
                tenant_id: tenant_id.clone(),
                tenant_name: Some(tenant.name),
                tenant_info: Some(tenant_info),
                today_usage,
            },
            today,
        )
        .await
    }

    /// Notifies if `report` crosses the tenant's armed threshold and the
    /// tenant has not been alerted on `today`. Returns whether a
    /// notification was posted.
    ///
    /// # Errors
    ///
    /// Returns the store error if the alert date cannot be recorded; no
    /// notification is posted then.
    pub async fn evaluate(&self, report: UsageReport, today: NaiveDate) -> Result<bool, EngineError> {
        let settings = &self.ctx.stores.settings;
        let Some(config) = settings
            .alert_config(&report.tenant_id)
            .filter(|c| c.enabled)
        else {
            return Ok(false);
        };

        if report.today_usage < config.threshold || settings.alerted_on(&report.tenant_id, today) {
            return Ok(false);
        }

        settings.mark_alerted(&report.tenant_id, today).await?;

        let tenant_info = report
            .tenant_info
            .unwrap_or_else(|| self.ctx.stores.tenant_info.get_or_default(&report.tenant_id));
        let name = report
            .tenant_name
            .or_else(|| self.ctx.stores.tenants.get(&report.tenant_id).map(|t| t.name))
            .unwrap_or_else(|| report.tenant_id.clone());
        let symbol = tenant_info.currency_symbol();

        let notification = Notification::new(
            format!("usage-alert-{}", report.tenant_id),
            format!("{name}: daily usage alert"),
            format!(
                "Today's usage {} reached your threshold of {}.",
                format_quota(report.today_usage, tenant_info.credit_unit, symbol),
                format_quota(config.threshold, tenant_info.credit_unit, symbol),
            ),
        );
        info!(
            tenant = %report.tenant_id,
            usage = report.today_usage,
            threshold = config.threshold,
            "Usage alert triggered"
        );
        self.notifier.notify(&notification).await;
        Ok(true)
    }

    async fn handle_message(&self, payload: Value) -> Result<Value, EngineError> {
        let report: UsageReport = serde_json::from_value(payload)
            .map_err(|e| EngineError::InvalidMessage(e.to_string()))?;
        let notified = self.evaluate(report, Local::now().date_naive()).await?;
        Ok(json!({"success": true, "notified": notified}))
    }
}

#[async_trait]
impl BackgroundModule for UsageAlertModule {
    fn name(&self) -> &'static str {
        "usage-alert"
    }

    async fn init(&self, router: &Arc<MessageRouter>) -> Result<Cleanup, EngineError> {
        let module = self.clone();
        router.register(CHECK_USAGE_ALERT, move |payload| {
            let module = module.clone();
            async move { module.handle_message(payload).await }
        });

        let module = self.clone();
        let interval = self.ctx.config.general.alert_interval();
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                module.check().await;
            }
        });

        let router = Arc::clone(router);
        Ok(Box::new(move || {
            timer.abort();
            router.unregister(CHECK_USAGE_ALERT);
        }))
    }
}
