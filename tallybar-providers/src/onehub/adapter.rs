//! one-hub payload normalization.

use chrono::NaiveDate;
use serde_json::Value;
use tallybar_core::{Balance, Cost, DEFAULT_CREDIT_UNIT, TenantInfo, Token, TokenGroup, TokenGroups};
use tallybar_fetch::FetchError;

use crate::newapi::adapter::full_key;
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

/// Normalizes dashboard rows. Each row's bucket starts at UTC midnight of
/// its date.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field, or the
/// `date` field of a row whose date doesn't parse.
pub fn normalize_costs(raw: &Value) -> Result<Vec<Cost>, FetchError> {
    items_at(raw, "dashboard")?
        .iter()
        .map(|item| {
            let row = item.fields();
            let tokens = row.count("prompt_tokens")? + row.count("complete_tokens")?;
            let mut cost = Cost::new(
                row.str_or("model_name", "unknown")?,
                row.f64_or("quota", 0.0)?,
                tokens,
            )
            .with_requests(row.count("request_count")?);
            cost.bucket_start = row
                .opt_str("date")?
                .map(|date| day_start(&row, &date))
                .transpose()?;
            Ok(cost)
        })
        .collect()
}

fn day_start(row: &RawObject<'_>, date: &str) -> Result<i64, FetchError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|day| day.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
        .map_err(|e| {
            FetchError::transformation(
                format!("{}.date", row.path()),
                format!("invalid date {date:?}: {e}"),
            )
        })
}

/// Normalizes a `{data, total_count}` token page.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_tokens(raw: &Value) -> Result<Vec<Token>, FetchError> {
    let page = RawObject::new(raw, "tokens")?;
    page.items("data")?
        .iter()
        .map(|item| {
            let row = item.fields();
            Ok(Token {
                secret_key: full_key(&row.str_or("key", "")?),
                label: row.str_or("name", "")?,
                credit_consumed: row.f64_or("used_quota", 0.0)?,
                last_used_at: row.opt_timestamp("accessed_time")?,
                group: row.str_or("group", "")?,
            })
        })
        .collect()
}

/// Normalizes `/api/user_group_map` (`{symbol: {name, ratio}}`).
///
/// # Errors
///
/// Returns a transformation error if an entry is not an object.
pub fn normalize_token_groups(raw: &Value) -> Result<TokenGroups, FetchError> {
    RawObject::new(raw, "groups")?
        .entries()?
        .into_iter()
        .map(|(symbol, item)| {
            let entry = item.fields();
            let group = TokenGroup {
                description: entry.str_or("name", symbol)?,
                multiplier: entry.f64_or("ratio", 1.0)?,
            };
            Ok((symbol.clone(), group))
        })
        .collect()
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
    let endpoints = status
        .opt_str("server_address")?
        .filter(|address| !address.is_empty())
        .into_iter()
        .collect();
    Ok(TenantInfo {
        credit_unit: status
            .opt_f64("quota_per_unit")?
            .filter(|unit| *unit > 0.0)
            .unwrap_or(DEFAULT_CREDIT_UNIT),
        exchange_rate: 1.0,
        display_format: display_format.to_string(),
        endpoints,
        notices: Vec::new(),
    })
}
