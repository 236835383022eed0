//! Refresh command - fetch balance, today's usage and tenant info.

use anyhow::Result;
use clap::Args;
use tallybar_engine::RefreshCoordinator;
use tracing::info;

use super::{find_tenant, open_context};
use crate::output::{JsonFormatter, RefreshRow, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the refresh command.
#[derive(Args, Default)]
pub struct RefreshArgs {
    /// Tenant id or name (default: every tenant).
    #[arg(long, short)]
    pub tenant: Option<String>,
}

/// Runs the refresh command.
pub async fn run(args: &RefreshArgs, cli: &Cli) -> Result<()> {
    let ctx = open_context(cli).await?;
    let coordinator = RefreshCoordinator::new(&ctx);

    let refreshes = match &args.tenant {
        Some(query) => {
            let tenant = find_tenant(&ctx, Some(query))?;
            vec![coordinator.refresh_tenant(&tenant).await]
        }
        None => coordinator.refresh_all().await,
    };

    if refreshes.is_empty() {
        if !cli.quiet {
            println!("{}", TextFormatter::new(!cli.no_color).format_tenants(&[]));
        }
        return Ok(());
    }

    let failed = refreshes.iter().filter(|r| !r.is_ok()).count();
    info!(tenants = refreshes.len(), failed, "Refresh finished");

    let rows: Vec<RefreshRow> = refreshes
        .into_iter()
        .map(|refresh| {
            let cached = ctx.stores.tenant_info.get_or_default(&refresh.tenant_id);
            RefreshRow::new(refresh, cached)
        })
        .collect();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = rows.iter().map(|row| formatter.format_refresh(row)).collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_refresh(&rows)?);
        }
    }

    Ok(())
}
