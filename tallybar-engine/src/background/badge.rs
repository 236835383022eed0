//! Toolbar badge.
//!
//! Shows the remaining balance of one tenant in display units, compacted to
//! a few characters. Recomputed on a timer (which also refreshes the
//! balance), whenever the badge settings or stored balances change, and on
//! `UPDATE_BADGE` messages.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tallybar_core::quota_to_currency;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{BackgroundModule, Cleanup, RunGuard};
use crate::context::AppContext;
use crate::error::EngineError;
use crate::orchestrators::BalanceOrchestrator;
use crate::router::{MessageRouter, UPDATE_BADGE};

/// Where badge text is shown.
pub trait BadgeSink: Send + Sync {
    /// Shows `text`.
    fn set_text(&self, text: &str);

    /// Removes the badge.
    fn clear(&self);
}

/// Badge sink that writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBadge;

impl BadgeSink for LogBadge {
    fn set_text(&self, text: &str) {
        info!(text, "Badge");
    }

    fn clear(&self) {
        debug!("Badge cleared");
    }
}

/// Formats a display amount into compact badge text.
///
/// ```
/// use tallybar_engine::background::format_badge;
///
/// assert_eq!(format_badge(3.14159), "3.14");
/// assert_eq!(format_badge(1234.0), "1.2k");
/// assert_eq!(format_badge(2_500_000.0), "2.5m");
/// ```
pub fn format_badge(amount: f64) -> String {
    if amount < 10.0 {
        format!("{amount:.2}")
    } else if amount < 100.0 {
        format!("{amount:.1}")
    } else if amount < 1_000.0 {
        format!("{amount:.0}")
    } else if amount < 10_000.0 {
        format!("{:.1}k", amount / 1_000.0)
    } else if amount < 1_000_000.0 {
        format!("{:.0}k", amount / 1_000.0)
    } else {
        format!("{:.1}m", amount / 1_000_000.0)
    }
}

/// The badge module.
#[derive(Clone)]
pub struct BadgeModule {
    ctx: AppContext,
    sink: Arc<dyn BadgeSink>,
    guard: RunGuard,
}

impl std::fmt::Debug for BadgeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BadgeModule").finish_non_exhaustive()
    }
}

impl BadgeModule {
    /// Creates the module.
    pub fn new(ctx: AppContext, sink: Arc<dyn BadgeSink>) -> Self {
        Self {
            ctx,
            sink,
            guard: RunGuard::default(),
        }
    }

    /// The badge text for the current store state, or `None` when the badge
    /// should be cleared.
    ///
    /// The configured badge tenant wins; without one the selected tenant is
    /// shown.
    pub fn compute(&self) -> Option<String> {
        let stores = &self.ctx.stores;
        let config = stores.settings.read(|s| s.badge.clone());
        if !config.enabled {
            return None;
        }
        let tenant_id = config.tenant_id.or_else(|| stores.tenants.selected_id())?;
        stores.tenants.get(&tenant_id)?;

        let balance = stores.balances.get(&tenant_id)?;
        let unit = stores.tenant_info.get_or_default(&tenant_id).credit_unit;
        let amount = quota_to_currency(balance.remaining_credit, unit);
        amount.is_finite().then(|| format_badge(amount))
    }

    /// Applies [`BadgeModule::compute`] to the sink and returns the text.
    pub fn update(&self) -> Option<String> {
        let text = self.compute();
        match &text {
            Some(text) => self.sink.set_text(text),
            None => self.sink.clear(),
        }
        text
    }

    /// Refreshes the badge tenant's balance, then updates the badge.
    pub async fn refresh(&self) {
        let Some(_permit) = self.guard.try_start() else {
            debug!("Badge refresh already running, skipping");
            return;
        };

        let stores = &self.ctx.stores;
        let timeout = self.ctx.config.general.hydration_timeout();
        if !stores.wait_ready_timeout(timeout).await {
            warn!(?timeout, "Stores not hydrated, updating badge with current state");
        }

        let config = stores.settings.read(|s| s.badge.clone());
        let tenant = config
            .enabled
            .then(|| config.tenant_id.or_else(|| stores.tenants.selected_id()))
            .flatten()
            .and_then(|id| stores.tenants.get(&id));

        if let Some(tenant) = tenant {
            if let Err(e) = BalanceOrchestrator::new(&self.ctx).refresh(&tenant).await {
                if !e.is_silent() {
                    warn!(tenant = %tenant.id, error = %e, "Badge balance refresh failed");
                }
            }
        }
        self.update();
    }
}

#[async_trait]
impl BackgroundModule for BadgeModule {
    fn name(&self) -> &'static str {
        "badge"
    }

    async fn init(&self, router: &Arc<MessageRouter>) -> Result<Cleanup, EngineError> {
        let module = self.clone();
        router.register(UPDATE_BADGE, move |_| {
            let module = module.clone();
            async move { Ok(json!({"success": true, "text": module.update()})) }
        });

        let module = self.clone();
        let on_settings = self
            .ctx
            .stores
            .settings
            .on_change(|s| s.badge.clone(), move |_| {
                module.update();
            });
        let module = self.clone();
        let on_balances = self
            .ctx
            .stores
            .balances
            .on_change(|s| s.balances.clone(), move |_| {
                module.update();
            });

        let module = self.clone();
        let interval = self.ctx.config.general.refresh_interval();
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                module.refresh().await;
            }
        });

        let router = Arc::clone(router);
        Ok(Box::new(move || {
            timer.abort();
            drop(on_settings);
            drop(on_balances);
            router.unregister(UPDATE_BADGE);
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tallybar_core::{Balance, TenantInfo};
    use tallybar_fetch::Message;
    use tallybar_store::BadgeConfig;

    use super::*;
    use crate::testing::{MockPlatform, RecordingBadge, add_tenant, context};

    #[test]
    fn test_format_badge_ranges() {
        assert_eq!(format_badge(0.0), "0.00");
        assert_eq!(format_badge(9.5), "9.50");
        assert_eq!(format_badge(42.42), "42.4");
        assert_eq!(format_badge(999.4), "999");
        assert_eq!(format_badge(1500.0), "1.5k");
        assert_eq!(format_badge(15_000.0), "15k");
        assert_eq!(format_badge(999_000.0), "999k");
        assert_eq!(format_badge(1_000_000.0), "1.0m");
        assert_eq!(format_badge(12_340_000.0), "12.3m");
    }

    async fn enable(ctx: &AppContext, tenant_id: Option<String>) {
        ctx.stores
            .settings
            .set_badge(BadgeConfig {
                enabled: true,
                tenant_id,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_compute() {
        let ctx = context(&MockPlatform::new()).await;
        let badge = RecordingBadge::new();
        let module = BadgeModule::new(ctx.clone(), badge.clone());
        let tenant = add_tenant(&ctx, "main").await;

        // disabled
        ctx.stores.balances.set(&tenant.id, Balance::new(1_000_000.0, 0.0)).await.unwrap();
        assert_eq!(module.update(), None);
        assert_eq!(badge.text(), None);

        // selected tenant, default credit unit
        enable(&ctx, None).await;
        assert_eq!(module.update().as_deref(), Some("2.00"));

        ctx.stores
            .tenant_info
            .set(
                &tenant.id,
                TenantInfo {
                    credit_unit: 100.0,
                    ..TenantInfo::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(module.update().as_deref(), Some("10k"));
        assert_eq!(badge.text().as_deref(), Some("10k"));

        // unknown tenant
        enable(&ctx, Some("ghost".to_string())).await;
        assert_eq!(module.update(), None);
    }

    #[tokio::test]
    async fn test_reacts_to_changes_and_messages() {
        let platform = MockPlatform::new();
        platform.on(
            "/api/user/self",
            json!({"success": true, "data": {"quota": 5_000_000, "used_quota": 0}}),
        );
        let ctx = context(&platform).await;
        let tenant = add_tenant(&ctx, "main").await;
        let badge = RecordingBadge::new();
        let module = BadgeModule::new(ctx.clone(), badge.clone());
        let router = MessageRouter::new();
        let cleanup = module.init(&router).await.unwrap();

        enable(&ctx, Some(tenant.id.clone())).await;
        ctx.stores.balances.set(&tenant.id, Balance::new(500_000.0, 0.0)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while badge.text().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let answer = router.dispatch(Message::new(UPDATE_BADGE, json!({}))).await.unwrap();
        assert!(answer["text"].is_string());

        cleanup();
        assert!(router.types().is_empty());
    }
}
