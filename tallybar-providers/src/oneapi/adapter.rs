//! one-api payload normalization.
//!
//! Log records become one cost entry each (one request, billed through the
//! record's token). Tokens carry no group. Groups are bare names, so every
//! group gets the default description and a 1.0 multiplier.

use serde_json::Value;
use tallybar_core::{Balance, Cost, DEFAULT_CREDIT_UNIT, TenantInfo, Token, TokenGroup, TokenGroups};
use tallybar_fetch::FetchError;

use crate::newapi::adapter::{full_key, token_items};
use crate::raw::{RawObject, items_at};

/// Normalizes `/api/user/self`.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_balance(raw: &Value) -> Result<Balance, FetchError> {
    let user = RawObject::new(raw, "user")?;
    Ok(Balance::new(
        user.f64_or("quota", 0.0)?,
        user.f64_or("used_quota", 0.0)?,
    ))
}

/// Normalizes the concatenated consumption log.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_costs(raw: &Value) -> Result<Vec<Cost>, FetchError> {
    items_at(raw, "logs")?
        .iter()
        .map(|item| {
            let log = item.fields();
            let tokens = log.count("prompt_tokens")? + log.count("completion_tokens")?;
            let mut cost = Cost::new(
                log.str_or("model_name", "unknown")?,
                log.f64_or("quota", 0.0)?,
                tokens,
            )
            .with_requests(1);
            cost.bucket_start = log.opt_timestamp("created_at")?;
            cost.endpoint = log.opt_str("token_name")?.filter(|name| !name.is_empty());
            Ok(cost)
        })
        .collect()
}

/// Normalizes a token page.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_tokens(raw: &Value) -> Result<Vec<Token>, FetchError> {
    token_items(raw)?
        .iter()
        .map(|item| {
            let row = item.fields();
            Ok(Token {
                secret_key: full_key(&row.str_or("key", "")?),
                label: row.str_or("name", "")?,
                credit_consumed: row.f64_or("used_quota", 0.0)?,
                last_used_at: row.opt_timestamp("accessed_time")?,
                group: String::new(),
            })
        })
        .collect()
}

/// Normalizes `/api/group/` (an array of names).
///
/// # Errors
///
/// Returns a transformation error if the payload is not an array of strings.
pub fn normalize_token_groups(raw: &Value) -> Result<TokenGroups, FetchError> {
    let wrapper = serde_json::json!({ "groups": raw });
    let names = RawObject::new(&wrapper, "")?.strings("groups")?;
    Ok(names
        .into_iter()
        .map(|name| (name, TokenGroup::default()))
        .collect())
}

/// Normalizes `/api/status`.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_tenant_info(raw: &Value) -> Result<TenantInfo, FetchError> {
    let status = RawObject::new(raw, "status")?;
    let display_format = if status.opt_bool("display_in_currency")? == Some(false) {
        "TOKENS"
    } else {
        "USD"
    };
    Ok(TenantInfo {
        credit_unit: status
            .opt_f64("quota_per_unit")?
            .filter(|unit| *unit > 0.0)
            .unwrap_or(DEFAULT_CREDIT_UNIT),
        exchange_rate: 1.0,
        display_format: display_format.to_string(),
        endpoints: Vec::new(),
        notices: Vec::new(),
    })
}
