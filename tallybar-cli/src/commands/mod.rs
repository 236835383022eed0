//! CLI command implementations.

pub mod alert;
pub mod analytics;
pub mod badge;
pub mod config;
pub mod daemon;
pub mod refresh;
pub mod tenants;
pub mod tokens;

use anyhow::Result;
use tallybar_core::Tenant;
use tallybar_engine::AppContext;
use tallybar_store::Config;
use thiserror::Error;
use tracing::{debug, warn};

use crate::Cli;

/// A tenant argument that matched nothing.
#[derive(Debug, Error)]
pub enum TenantLookupError {
    /// Neither an id nor a name matched.
    #[error("No tenant matches '{0}'")]
    NoMatch(String),

    /// No query was given and no tenant is selected.
    #[error("No tenant selected (pass --tenant or run `tallybar tenants select`)")]
    NoneSelected,
}

/// Loads the configuration and opens the stores, waiting (bounded) for
/// them to hydrate.
pub async fn open_context(cli: &Cli) -> Result<AppContext> {
    let config = Config::load()?;
    let timeout = config.general.hydration_timeout();

    let ctx = match &cli.data_dir {
        Some(dir) => AppContext::open_at(config, dir)?,
        None => AppContext::open(config)?,
    };

    if !ctx.stores.wait_ready_timeout(timeout).await {
        warn!(?timeout, "Stores not hydrated, continuing with current state");
    }
    debug!(tenants = ctx.stores.tenants.list().len(), "Context ready");
    Ok(ctx)
}

/// Resolves a tenant argument: an id, or a case-insensitive name. Without
/// a query the selected tenant is used.
pub fn find_tenant(ctx: &AppContext, query: Option<&str>) -> Result<Tenant, TenantLookupError> {
    let tenants = &ctx.stores.tenants;
    let Some(query) = query else {
        return tenants.selected().ok_or(TenantLookupError::NoneSelected);
    };

    tenants
        .get(&query.to_string())
        .or_else(|| {
            tenants
                .list()
                .into_iter()
                .find(|t| t.name.eq_ignore_ascii_case(query.trim()))
        })
        .ok_or_else(|| TenantLookupError::NoMatch(query.to_string()))
}
