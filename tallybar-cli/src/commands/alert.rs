//! Alert command - arm and disarm daily usage alerts.

use anyhow::{Result, bail};
use chrono::Local;
use clap::{Args, Subcommand};
use serde::Serialize;
use tallybar_core::{currency_to_quota, format_quota};
use tallybar_engine::AppContext;
use tracing::info;

use super::{find_tenant, open_context};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the alert command.
#[derive(Args)]
pub struct AlertArgs {
    #[command(subcommand)]
    pub action: AlertAction,
}

/// Alert subcommands.
#[derive(Subcommand)]
pub enum AlertAction {
    /// Alert when today's usage reaches an amount.
    Set {
        /// Tenant id or name.
        tenant: String,

        /// Threshold in display currency (e.g. 5 for $5).
        amount: f64,

        /// Treat the amount as raw quota units.
        #[arg(long)]
        quota: bool,
    },

    /// Disarm a tenant's alert, keeping its threshold.
    Disable {
        /// Tenant id or name.
        tenant: String,
    },

    /// Show configured alerts.
    List,
}

/// Runs the alert command.
pub async fn run(args: &AlertArgs, cli: &Cli) -> Result<()> {
    let ctx = open_context(cli).await?;

    match &args.action {
        AlertAction::Set {
            tenant,
            amount,
            quota,
        } => set(&ctx, tenant, *amount, *quota, cli).await,
        AlertAction::Disable { tenant } => disable(&ctx, tenant, cli).await,
        AlertAction::List => list(&ctx, cli),
    }
}

async fn set(ctx: &AppContext, query: &str, amount: f64, raw: bool, cli: &Cli) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        bail!("Threshold must be a positive number");
    }

    let tenant = find_tenant(ctx, Some(query))?;
    let tenant_info = ctx.stores.tenant_info.get_or_default(&tenant.id);
    let threshold = if raw {
        amount
    } else {
        currency_to_quota(amount, tenant_info.credit_unit)
    };

    ctx.stores.settings.set_alert(&tenant.id, threshold).await?;
    info!(tenant = %tenant.id, threshold, "Usage alert armed");

    if !cli.quiet {
        println!(
            "Alert for {} at {} per day",
            tenant.name,
            format_quota(threshold, tenant_info.credit_unit, tenant_info.currency_symbol())
        );
    }
    Ok(())
}

async fn disable(ctx: &AppContext, query: &str, cli: &Cli) -> Result<()> {
    let tenant = find_tenant(ctx, Some(query))?;
    if ctx.stores.settings.alert_config(&tenant.id).is_none() {
        bail!("No alert configured for {}", tenant.name);
    }

    ctx.stores.settings.disable_alert(&tenant.id).await?;
    info!(tenant = %tenant.id, "Usage alert disarmed");

    if !cli.quiet {
        println!("Alert disabled for {}", tenant.name);
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertOutput {
    tenant_id: String,
    tenant_name: String,
    enabled: bool,
    threshold: f64,
    display: String,
    alerted_today: bool,
}

fn list(ctx: &AppContext, cli: &Cli) -> Result<()> {
    let settings = ctx.stores.settings.get();
    let today = Local::now().date_naive();

    let mut alerts: Vec<AlertOutput> = settings
        .daily_usage_alert
        .iter()
        .map(|(tenant_id, config)| {
            let info = ctx.stores.tenant_info.get_or_default(tenant_id);
            AlertOutput {
                tenant_id: tenant_id.clone(),
                tenant_name: ctx
                    .stores
                    .tenants
                    .get(tenant_id)
                    .map_or_else(|| tenant_id.clone(), |t| t.name),
                enabled: config.enabled,
                threshold: config.threshold,
                display: format_quota(config.threshold, info.credit_unit, info.currency_symbol()),
                alerted_today: ctx.stores.settings.alerted_on(tenant_id, today),
            }
        })
        .collect();
    alerts.sort_by(|a, b| a.tenant_name.cmp(&b.tenant_name));

    match cli.format {
        OutputFormat::Text => {
            if alerts.is_empty() {
                println!("No alerts configured");
            }
            for alert in &alerts {
                let state = match (alert.enabled, alert.alerted_today) {
                    (false, _) => "disabled",
                    (true, true) => "fired today",
                    (true, false) => "armed",
                };
                println!("{:<20} {:>10}  {state}", alert.tenant_name, alert.display);
            }
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&alerts)?);
        }
    }

    Ok(())
}
