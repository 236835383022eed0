//! Tokens command - list a tenant's API tokens.

use anyhow::Result;
use clap::Args;
use tallybar_engine::TokenOrchestrator;
use tracing::warn;

use super::{find_tenant, open_context};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the tokens command.
#[derive(Args)]
pub struct TokensArgs {
    /// Tenant id or name (default: the selected tenant).
    #[arg(long, short)]
    pub tenant: Option<String>,

    /// Page number, starting at 1.
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Page size.
    #[arg(long, default_value = "50")]
    pub size: u32,
}

/// Runs the tokens command.
pub async fn run(args: &TokensArgs, cli: &Cli) -> Result<()> {
    let ctx = open_context(cli).await?;
    let tenant = find_tenant(&ctx, args.tenant.as_deref())?;
    let orchestrator = TokenOrchestrator::new(&ctx);

    let (tokens, groups) = tokio::join!(
        orchestrator.refresh(&tenant, args.page, args.size),
        orchestrator.refresh_groups(&tenant),
    );
    let tokens = tokens?;
    // Groups only decorate the listing.
    let groups = groups.unwrap_or_else(|e| {
        if !e.is_silent() {
            warn!(tenant = %tenant.id, error = %e, "Failed to fetch token groups");
        }
        ctx.stores.tokens.groups(&tenant.id)
    });

    let info = ctx.stores.tenant_info.get_or_default(&tenant.id);
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_tokens(&tokens, &groups, &info));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_tokens(&tokens, &groups, &info)?);
        }
    }

    Ok(())
}
