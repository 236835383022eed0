//! Output formatting for CLI.

mod json;
mod text;

use chrono::{DateTime, Utc};
use tallybar_core::{Balance, Cost, Tenant, TenantId, TenantInfo};
use tallybar_engine::TenantRefresh;

pub use json::JsonFormatter;
pub use text::TextFormatter;
#[cfg(test)]
mod tests;

/// One line of `tenants list`.
#[derive(Debug, Clone)]
pub struct TenantRow {
    /// The tenant.
    pub tenant: Tenant,
    /// Last stored balance.
    pub balance: Option<Balance>,
    /// Conversion info (defaults when never fetched).
    pub info: TenantInfo,
    /// Whether this is the selected tenant.
    pub selected: bool,
    /// When the balance was stored.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Display form of one tenant refresh.
#[derive(Debug, Clone)]
pub struct RefreshRow {
    /// Tenant id.
    pub tenant_id: TenantId,
    /// Tenant name.
    pub tenant_name: String,
    /// Fresh tenant info, or the cached one when the refresh failed.
    pub info: TenantInfo,
    /// Fresh balance.
    pub balance: Option<Balance>,
    /// Today's usage in raw quota units.
    pub today_usage: Option<f64>,
    /// Failed domains with their user-facing message. Silent failures are
    /// left out.
    pub errors: Vec<(&'static str, String)>,
}

impl RefreshRow {
    /// Builds the row, falling back to `cached_info` for conversions.
    pub fn new(refresh: TenantRefresh, cached_info: TenantInfo) -> Self {
        let errors = refresh
            .errors()
            .into_iter()
            .filter_map(|(domain, e)| e.user_message().map(|m| (domain, m)))
            .collect();

        Self {
            tenant_id: refresh.tenant_id,
            tenant_name: refresh.tenant_name,
            info: refresh.tenant_info.unwrap_or(cached_info),
            balance: refresh.balance.ok(),
            today_usage: refresh.costs.ok().map(|c| Cost::total_credit(&c)),
            errors,
        }
    }
}
