//! Platform display information for a tenant.

use serde::{Deserialize, Serialize};

/// Quota units per display-currency unit on platforms that don't report one.
pub const DEFAULT_CREDIT_UNIT: f64 = 500_000.0;

/// Display and conversion information published by a tenant's platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    /// Quota units per one display-currency unit.
    pub credit_unit: f64,
    /// Display-currency exchange rate against USD.
    pub exchange_rate: f64,
    /// Display format, e.g. `USD` or `CNY`.
    pub display_format: String,
    /// API endpoints advertised by the platform.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Notices and announcements.
    #[serde(default)]
    pub notices: Vec<String>,
}

impl Default for TenantInfo {
    fn default() -> Self {
        Self {
            credit_unit: DEFAULT_CREDIT_UNIT,
            exchange_rate: 1.0,
            display_format: "USD".to_string(),
            endpoints: Vec::new(),
            notices: Vec::new(),
        }
    }
}

impl TenantInfo {
    /// Returns the currency symbol for the display format.
    pub fn currency_symbol(&self) -> &'static str {
        match self.display_format.to_ascii_uppercase().as_str() {
            "CNY" | "RMB" => "¥",
            "EUR" => "€",
            "TOKENS" => "",
            _ => "$",
        }
    }
}
