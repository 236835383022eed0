//! Analytics command - usage series and breakdowns for one tenant.

use anyhow::{Result, bail};
use clap::Args;
use tallybar_core::{AnalyticsStatus, Period};
use tallybar_engine::AnalyticsOrchestrator;

use super::{find_tenant, open_context};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the analytics command.
#[derive(Args)]
pub struct AnalyticsArgs {
    /// Tenant id or name (default: the selected tenant).
    #[arg(long, short)]
    pub tenant: Option<String>,

    /// Period: 1d, 7d, 14d, 30d.
    #[arg(long, short, default_value = "1d")]
    pub period: String,
}

/// Runs the analytics command.
pub async fn run(args: &AnalyticsArgs, cli: &Cli) -> Result<()> {
    let period: Period = args.period.parse()?;
    let ctx = open_context(cli).await?;
    let tenant = find_tenant(&ctx, args.tenant.as_deref())?;

    let snapshot = AnalyticsOrchestrator::new(&ctx).refresh(&tenant, period).await;
    if let AnalyticsStatus::Error(message) = ctx.stores.analytics.status() {
        bail!("{message}");
    }

    let info = ctx.stores.tenant_info.get_or_default(&tenant.id);
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_analytics(&tenant.name, &snapshot, &info));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!(
                "{}",
                formatter.format_analytics(&tenant.id, &tenant.name, &snapshot, &info)?
            );
        }
    }

    Ok(())
}
