//! Tenants command - register, list, select and remove accounts.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use tallybar_core::{PlatformType, SortDirection, SortField, Tenant, TenantSortConfig, sort_tenants};
use tallybar_engine::AppContext;
use tallybar_engine::background::TenantWatchModule;
use tracing::{info, warn};

use super::{find_tenant, open_context};
use crate::output::{JsonFormatter, TenantRow, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the tenants command.
#[derive(Args)]
pub struct TenantsArgs {
    #[command(subcommand)]
    pub action: Option<TenantsAction>,
}

/// Tenants subcommands.
#[derive(Subcommand)]
pub enum TenantsAction {
    /// Register a tenant.
    Add {
        /// Display name.
        name: String,

        /// Base URL of the platform.
        url: String,

        /// Access token.
        #[arg(long, short)]
        token: String,

        /// Platform user id (required by some platforms).
        #[arg(long, short)]
        user_id: Option<String>,

        /// Platform: newapi, oneapi, onehub, veloera.
        #[arg(long, short, default_value = "newapi")]
        platform: String,
    },

    /// List tenants with their stored balances (default).
    List {
        /// Sort by: manual, name, balance, consumed. Saved as the new default.
        #[arg(long, short)]
        sort: Option<String>,

        /// Sort descending.
        #[arg(long)]
        desc: bool,
    },

    /// Select the tenant other commands default to.
    Select {
        /// Tenant id or name.
        tenant: String,
    },

    /// Remove a tenant and everything stored for it.
    Remove {
        /// Tenant id or name.
        tenant: String,
    },
}

/// Runs the tenants command.
pub async fn run(args: &TenantsArgs, cli: &Cli) -> Result<()> {
    let ctx = open_context(cli).await?;

    match &args.action {
        Some(TenantsAction::Add {
            name,
            url,
            token,
            user_id,
            platform,
        }) => add(&ctx, name, url, token, user_id.as_deref(), platform, cli).await,
        Some(TenantsAction::List { sort, desc }) => list(&ctx, sort.as_deref(), *desc, cli).await,
        Some(TenantsAction::Select { tenant }) => select(&ctx, tenant, cli).await,
        Some(TenantsAction::Remove { tenant }) => remove(&ctx, tenant, cli).await,
        None => list(&ctx, None, false, cli).await,
    }
}

async fn add(
    ctx: &AppContext,
    name: &str,
    url: &str,
    token: &str,
    user_id: Option<&str>,
    platform: &str,
    cli: &Cli,
) -> Result<()> {
    let platform: PlatformType = platform.parse()?;
    let mut tenant = Tenant::new(name, url, token, platform);
    if let Some(user_id) = user_id {
        tenant = tenant.with_user_id(user_id);
    }

    let tenant = ctx.stores.tenants.add(tenant).await?;
    info!(tenant = %tenant.id, platform = %platform, "Tenant registered");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Added: {} ({}, {})", tenant.name, platform.display_name(), tenant.id);
            }
        }
        OutputFormat::Json => {
            let row = row_for(ctx, tenant);
            println!("{}", JsonFormatter::new(cli.pretty).format_tenants(&[row])?);
        }
    }

    Ok(())
}

fn parse_sort_field(value: &str) -> Result<SortField> {
    Ok(match value.to_ascii_lowercase().as_str() {
        "manual" => SortField::Manual,
        "name" => SortField::Name,
        "balance" => SortField::Balance,
        "consumed" | "used" => SortField::Consumed,
        _ => bail!("Unknown sort field: {value}. Use: manual, name, balance, consumed"),
    })
}

fn row_for(ctx: &AppContext, tenant: Tenant) -> TenantRow {
    let stores = &ctx.stores;
    TenantRow {
        balance: stores.balances.get(&tenant.id),
        info: stores.tenant_info.get_or_default(&tenant.id),
        selected: stores.tenants.selected_id().as_ref() == Some(&tenant.id),
        updated_at: stores.balances.updated_at(&tenant.id),
        tenant,
    }
}

/// Builds the rows of the tenant list in the configured order.
pub fn tenant_rows(ctx: &AppContext, sort: &TenantSortConfig) -> Vec<TenantRow> {
    let tenants = ctx.stores.tenants.list();
    let balances = ctx.stores.balances.all();

    sort_tenants(&tenants, &balances, sort)
        .into_iter()
        .map(|tenant| row_for(ctx, tenant))
        .collect()
}

async fn list(ctx: &AppContext, sort: Option<&str>, desc: bool, cli: &Cli) -> Result<()> {
    let settings = &ctx.stores.settings;
    let mut config = settings.read(|s| s.tenant_sort.clone());

    if let Some(field) = sort {
        config.field = parse_sort_field(field)?;
        config.direction = if desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        if let Err(e) = settings.set_sort(config.clone()).await {
            warn!(error = %e, "Failed to save sort preference");
        }
    }

    let rows = tenant_rows(ctx, &config);
    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_tenants(&rows));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_tenants(&rows)?);
        }
    }

    Ok(())
}

async fn select(ctx: &AppContext, query: &str, cli: &Cli) -> Result<()> {
    let tenant = find_tenant(ctx, Some(query))?;
    ctx.stores.tenants.select(&tenant.id).await?;

    if !cli.quiet {
        println!("Selected: {}", tenant.name);
    }
    Ok(())
}

async fn remove(ctx: &AppContext, query: &str, cli: &Cli) -> Result<()> {
    let tenant = find_tenant(ctx, Some(query))?;
    ctx.stores.tenants.remove(&tenant.id).await?;

    // No watcher runs in a one-shot command, so cascade here.
    let failures = TenantWatchModule::new(ctx.clone())
        .cascade_removal(&tenant.id)
        .await;
    if !failures.is_empty() {
        warn!(tenant = %tenant.id, failed = failures.len(), "Some tenant data was not removed");
    }

    if !cli.quiet {
        println!("Removed: {}", tenant.name);
    }
    Ok(())
}
