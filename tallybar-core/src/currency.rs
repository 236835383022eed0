//! Quota/currency conversion.
//!
//! Platforms count usage in integer quota units; `credit_unit` quota units
//! make one display-currency unit.

/// Converts raw quota to display currency. Returns 0 for a non-positive or
/// non-finite `credit_unit`.
pub fn quota_to_currency(quota: f64, credit_unit: f64) -> f64 {
    if !credit_unit.is_finite() || credit_unit <= 0.0 {
        return 0.0;
    }
    quota / credit_unit
}

/// Converts a display-currency amount back to raw quota.
pub fn currency_to_quota(amount: f64, credit_unit: f64) -> f64 {
    if !credit_unit.is_finite() || credit_unit <= 0.0 {
        return 0.0;
    }
    amount * credit_unit
}

/// Formats a quota amount in display currency with two decimals.
pub fn format_quota(quota: f64, credit_unit: f64, symbol: &str) -> String {
    format!("{symbol}{:.2}", quota_to_currency(quota, credit_unit))
}
