//! Badge command - preview and configure the balance badge.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use tallybar_engine::background::{BadgeModule, LogBadge};
use tallybar_store::BadgeConfig;

use super::{find_tenant, open_context};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the badge command.
#[derive(Args)]
pub struct BadgeArgs {
    #[command(subcommand)]
    pub action: Option<BadgeAction>,
}

/// Badge subcommands.
#[derive(Subcommand)]
pub enum BadgeAction {
    /// Show the current badge text (default).
    Show {
        /// Refresh the badge tenant's balance first.
        #[arg(long, short)]
        refresh: bool,
    },

    /// Show the badge, optionally pinned to one tenant.
    Enable {
        /// Tenant id or name (default: follow the selected tenant).
        #[arg(long, short)]
        tenant: Option<String>,
    },

    /// Hide the badge.
    Disable,
}

/// Runs the badge command.
pub async fn run(args: &BadgeArgs, cli: &Cli) -> Result<()> {
    let ctx = open_context(cli).await?;
    let settings = &ctx.stores.settings;

    match &args.action {
        Some(BadgeAction::Enable { tenant }) => {
            let tenant_id = match tenant {
                Some(query) => Some(find_tenant(&ctx, Some(query))?.id),
                None => None,
            };
            settings
                .set_badge(BadgeConfig {
                    enabled: true,
                    tenant_id,
                })
                .await?;
        }
        Some(BadgeAction::Disable) => {
            settings
                .set_badge(BadgeConfig {
                    enabled: false,
                    tenant_id: None,
                })
                .await?;
        }
        Some(BadgeAction::Show { .. }) | None => {}
    }

    let module = BadgeModule::new(ctx.clone(), Arc::new(LogBadge));
    if matches!(args.action, Some(BadgeAction::Show { refresh: true })) {
        module.refresh().await;
    }
    let text = module.compute();

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_badge(text.as_deref()));
        }
        OutputFormat::Json => {
            let config = settings.read(|s| s.badge.clone());
            let output = json!({
                "enabled": config.enabled,
                "tenantId": config.tenant_id,
                "text": text,
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}
