//! Daemon command - run the background modules until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tallybar_engine::background::{
    BadgeModule, FetchProxyModule, LogBadge, TenantWatchModule, UsageAlertModule,
};
use tallybar_engine::{
    AppContext, BackgroundModule, DesktopNotifier, LogNotifier, MessageRouter, ModuleRegistry,
    Notifier, RefreshCoordinator,
};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::open_context;
use crate::Cli;

/// Arguments for the daemon command.
#[derive(Args)]
pub struct DaemonArgs {
    /// Write notifications to the log instead of the desktop.
    #[arg(long)]
    pub log_notifications: bool,

    /// Skip the periodic refresh of every tenant.
    #[arg(long)]
    pub no_refresh: bool,
}

/// Runs the daemon command.
pub async fn run(args: &DaemonArgs, cli: &Cli) -> Result<()> {
    let ctx = open_context(cli).await?;

    let router = MessageRouter::new();
    router.init();

    let notifier: Arc<dyn Notifier> = if args.log_notifications {
        Arc::new(LogNotifier)
    } else {
        Arc::new(DesktopNotifier)
    };
    let modules: Vec<Arc<dyn BackgroundModule>> = vec![
        Arc::new(FetchProxyModule::new(ctx.transport())),
        Arc::new(TenantWatchModule::new(ctx.clone())),
        Arc::new(UsageAlertModule::new(ctx.clone(), notifier)),
        Arc::new(BadgeModule::new(ctx.clone(), Arc::new(LogBadge))),
    ];
    let registry = ModuleRegistry::init_all(&router, &modules).await?;

    let refresh_interval = ctx.config.general.refresh_interval();
    if !cli.quiet {
        println!(
            "TallyBar daemon running ({} modules, refresh every {}s)",
            registry.names().len(),
            refresh_interval.as_secs()
        );
        println!("Press Ctrl+C to exit");
    }

    if args.no_refresh {
        tokio::signal::ctrl_c().await?;
    } else {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            () = refresh_loop(ctx, refresh_interval) => {}
        }
    }

    info!("Shutting down");
    registry.shutdown();
    Ok(())
}

async fn refresh_loop(ctx: AppContext, every: Duration) {
    let coordinator = RefreshCoordinator::new(&ctx);
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let refreshes = coordinator.refresh_all().await;
        let failed = refreshes.iter().filter(|r| !r.is_ok()).count();
        if failed > 0 {
            warn!(tenants = refreshes.len(), failed, "Periodic refresh had failures");
        } else {
            debug!(tenants = refreshes.len(), "Periodic refresh finished");
        }
    }
}
