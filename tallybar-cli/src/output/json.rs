//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tallybar_core::{AnalyticsSnapshot, Balance, Token, TokenGroups, TenantInfo, quota_to_currency};

use super::{RefreshRow, TenantRow};

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one tenant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantOutput {
    pub id: String,
    pub name: String,
    pub url: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceOutput>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_datetime_opt"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Balance in raw quota and display currency.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOutput {
    pub remaining_credit: f64,
    pub consumed_credit: f64,
    pub remaining: f64,
    pub consumed: f64,
    pub currency: String,
}

impl BalanceOutput {
    fn new(balance: Balance, info: &TenantInfo) -> Self {
        Self {
            remaining_credit: balance.remaining_credit,
            consumed_credit: balance.consumed_credit,
            remaining: quota_to_currency(balance.remaining_credit, info.credit_unit),
            consumed: quota_to_currency(balance.consumed_credit, info.credit_unit),
            currency: info.currency_symbol().to_string(),
        }
    }
}

/// JSON output for one tenant refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutput {
    pub tenant_id: String,
    pub tenant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today_usage: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorOutput>,
}

/// A failed domain.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub domain: String,
    pub message: String,
}

/// JSON output for analytics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOutput<'a> {
    pub tenant_id: &'a str,
    pub tenant_name: &'a str,
    pub currency: &'a str,
    pub credit_unit: f64,
    #[serde(flatten)]
    pub snapshot: &'a AnalyticsSnapshot,
}

/// JSON output for one API token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutput {
    pub label: String,
    pub key: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    pub credit_consumed: f64,
    pub consumed: f64,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_datetime_opt"
    )]
    pub last_used_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Serialization helpers
// ============================================================================

#[allow(clippy::ref_option)]
fn serialize_datetime_opt<S>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats the tenant list.
    pub fn format_tenants(&self, rows: &[TenantRow]) -> Result<String> {
        let outputs: Vec<TenantOutput> = rows.iter().map(Self::tenant_to_output).collect();
        self.format(&outputs)
    }

    fn tenant_to_output(row: &TenantRow) -> TenantOutput {
        TenantOutput {
            id: row.tenant.id.clone(),
            name: row.tenant.name.clone(),
            url: row.tenant.url.clone(),
            platform: row.tenant.platform().cli_name().to_string(),
            user_id: row.tenant.user_id.clone(),
            selected: row.selected,
            balance: row.balance.map(|b| BalanceOutput::new(b, &row.info)),
            updated_at: row.updated_at,
        }
    }

    /// Formats refresh outcomes. A single outcome is emitted as an object.
    pub fn format_refresh(&self, rows: &[RefreshRow]) -> Result<String> {
        let outputs: Vec<RefreshOutput> = rows.iter().map(Self::refresh_to_output).collect();

        if outputs.len() == 1 {
            self.format(&outputs[0])
        } else {
            self.format(&outputs)
        }
    }

    fn refresh_to_output(row: &RefreshRow) -> RefreshOutput {
        RefreshOutput {
            tenant_id: row.tenant_id.clone(),
            tenant_name: row.tenant_name.clone(),
            balance: row.balance.map(|b| BalanceOutput::new(b, &row.info)),
            today_usage: row
                .today_usage
                .map(|q| quota_to_currency(q, row.info.credit_unit)),
            errors: row
                .errors
                .iter()
                .map(|(domain, message)| ErrorOutput {
                    domain: (*domain).to_string(),
                    message: message.clone(),
                })
                .collect(),
        }
    }

    /// Formats an analytics snapshot.
    pub fn format_analytics(
        &self,
        tenant_id: &str,
        tenant_name: &str,
        snapshot: &AnalyticsSnapshot,
        info: &TenantInfo,
    ) -> Result<String> {
        self.format(&AnalyticsOutput {
            tenant_id,
            tenant_name,
            currency: info.currency_symbol(),
            credit_unit: info.credit_unit,
            snapshot,
        })
    }

    /// Formats API tokens. Keys are masked.
    pub fn format_tokens(&self, tokens: &[Token], groups: &TokenGroups, info: &TenantInfo) -> Result<String> {
        let outputs: Vec<TokenOutput> = tokens
            .iter()
            .map(|token| TokenOutput {
                label: token.label.clone(),
                key: token.masked_key(),
                group: token.group.clone(),
                multiplier: groups.get(&token.group).map(|g| g.multiplier),
                credit_consumed: token.credit_consumed,
                consumed: quota_to_currency(token.credit_consumed, info.credit_unit),
                last_used_at: token.last_used_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            })
            .collect();

        self.format(&outputs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_balance_output_converts() {
        let info = TenantInfo {
            credit_unit: 100.0,
            ..TenantInfo::default()
        };
        let output = BalanceOutput::new(Balance::new(250.0, 50.0), &info);
        assert!((output.remaining - 2.5).abs() < f64::EPSILON);
        assert!((output.consumed - 0.5).abs() < f64::EPSILON);
        assert_eq!(output.currency, info.currency_symbol());
    }
}
