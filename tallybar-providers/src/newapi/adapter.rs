//! new-api payload normalization.
//!
//! Defaults for absent fields:
//!
//! - quota / used_quota: 0
//! - cost model name: `unknown`; counts: 0
//! - token group: `""` (default group); description `""`; ratio 1.0
//! - quota_per_unit: 500000; usd_exchange_rate: 1.0; display type: `USD`,
//!   or `TOKENS` when `display_in_currency` is false

use serde_json::Value;
use tallybar_core::{Balance, Cost, DEFAULT_CREDIT_UNIT, TenantInfo, Token, TokenGroup, TokenGroups};
use tallybar_fetch::FetchError;

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

/// Normalizes `/api/data/self` into one entry per model and hour.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_costs(raw: &Value) -> Result<Vec<Cost>, FetchError> {
    items_at(raw, "quota_data")?
        .iter()
        .map(|item| {
            let row = item.fields();
            let mut cost = Cost::new(
                row.str_or("model_name", "unknown")?,
                row.f64_or("quota", 0.0)?,
                row.count("token_used")?,
            )
            .with_requests(row.count("count")?);
            cost.bucket_start = row.opt_timestamp("created_at")?;
            Ok(cost)
        })
        .collect()
}

/// Returns the token items of a list that is either a bare array or a page
/// object (`items` or `data`).
pub(crate) fn token_items(raw: &Value) -> Result<Vec<crate::raw::RawItem<'_>>, FetchError> {
    match raw {
        Value::Object(map) if map.contains_key("items") => {
            RawObject::new(raw, "tokens")?.items("items")
        }
        Value::Object(map) if map.contains_key("data") => {
            RawObject::new(raw, "tokens")?.items("data")
        }
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        _ => items_at(raw, "tokens"),
    }
}

/// Returns the token key with the `sk-` prefix platforms strip on display.
pub(crate) fn full_key(key: &str) -> String {
    if key.is_empty() || key.starts_with("sk-") {
        key.to_string()
    } else {
        format!("sk-{key}")
    }
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
                group: row.str_or("group", "")?,
            })
        })
        .collect()
}

/// Normalizes `/api/user/self/groups`.
///
/// Older releases map group names straight to a ratio number; both shapes
/// are accepted.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed group.
pub fn normalize_token_groups(raw: &Value) -> Result<TokenGroups, FetchError> {
    let Value::Object(map) = raw else {
        if raw.is_null() {
            return Ok(TokenGroups::new());
        }
        return Err(FetchError::transformation("groups", "expected object"));
    };

    let mut groups = TokenGroups::new();
    for (name, value) in map {
        let group = match value {
            Value::Number(ratio) => TokenGroup {
                multiplier: ratio.as_f64().unwrap_or(1.0),
                ..TokenGroup::default()
            },
            Value::Object(_) => {
                let path = format!("groups.{name}");
                let fields = RawObject::new(value, &path)?;
                TokenGroup {
                    description: fields.str_or("desc", "")?,
                    multiplier: fields.f64_or("ratio", 1.0)?,
                }
            }
            Value::Null => TokenGroup::default(),
            _ => {
                return Err(FetchError::transformation(
                    format!("groups.{name}"),
                    "expected object or number",
                ));
            }
        };
        groups.insert(name.clone(), group);
    }
    Ok(groups)
}

/// Normalizes `/api/status`.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_tenant_info(raw: &Value) -> Result<TenantInfo, FetchError> {
    let status = RawObject::new(raw, "status")?;

    let credit_unit = status
        .opt_f64("quota_per_unit")?
        .filter(|unit| *unit > 0.0)
        .unwrap_or(DEFAULT_CREDIT_UNIT);

    let display_format = match status.opt_str("quota_display_type")? {
        Some(kind) if !kind.is_empty() => kind.to_ascii_uppercase(),
        _ if status.opt_bool("display_in_currency")? == Some(false) => "TOKENS".to_string(),
        _ => "USD".to_string(),
    };

    let endpoints = status
        .items("api_info")?
        .iter()
        .map(|item| item.fields().str_or("url", ""))
        .filter(|url| url.as_ref().map_or(true, |u| !u.is_empty()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut notices = status
        .items("announcements")?
        .iter()
        .map(|item| item.fields().str_or("content", ""))
        .filter(|text| text.as_ref().map_or(true, |t| !t.trim().is_empty()))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(notice) = status.opt_str("notice")?.filter(|n| !n.trim().is_empty()) {
        notices.push(notice);
    }

    Ok(TenantInfo {
        credit_unit,
        exchange_rate: status.f64_or("usd_exchange_rate", 1.0)?,
        display_format,
        endpoints,
        notices,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_balance() {
        let balance = normalize_balance(&json!({"quota": 500000, "used_quota": "1200"})).unwrap();
        assert_eq!(balance, Balance::new(500_000.0, 1200.0));
    }

    #[test]
    fn test_costs() {
        let raw = json!([
            {"model_name": "gpt-4o", "created_at": 1_700_000_000, "token_used": 1200, "count": 3, "quota": 900},
            {"created_at": 1_700_003_600, "quota": 10}
        ]);
        let costs = normalize_costs(&raw).unwrap();
        assert_eq!(costs.len(), 2);
        assert_eq!(costs[0].model_id, "gpt-4o");
        assert_eq!(costs[0].request_count, 3);
        assert_eq!(costs[0].bucket_start, Some(1_700_000_000));
        assert_eq!(costs[1].model_id, "unknown");
        assert_eq!(costs[1].token_usage, 0);
    }

    #[test]
    fn test_tokens_page_object() {
        let raw = json!({"items": [
            {"name": "ci", "key": "abcd1234efgh", "used_quota": 42, "accessed_time": 0, "group": "vip"}
        ], "total": 1});
        let tokens = normalize_tokens(&raw).unwrap();
        assert_eq!(tokens[0].secret_key, "sk-abcd1234efgh");
        assert_eq!(tokens[0].label, "ci");
        assert!(tokens[0].last_used_at.is_none());
        assert_eq!(tokens[0].group, "vip");
    }

    #[test]
    fn test_groups_both_shapes() {
        let groups = normalize_token_groups(&json!({
            "default": {"desc": "Default", "ratio": 1},
            "vip": 0.5,
            "bare": {}
        }))
        .unwrap();
        assert_eq!(groups["default"].description, "Default");
        assert_eq!(groups["vip"].multiplier, 0.5);
        assert_eq!(groups["bare"], TokenGroup::default());
    }

    #[test]
    fn test_tenant_info() {
        let info = normalize_tenant_info(&json!({
            "quota_per_unit": 500000,
            "usd_exchange_rate": 7.3,
            "quota_display_type": "cny",
            "api_info": [{"url": "https://a.example"}, {"url": ""}],
            "announcements": [{"content": "maintenance"}],
            "notice": ""
        }))
        .unwrap();
        assert_eq!(info.display_format, "CNY");
        assert_eq!(info.exchange_rate, 7.3);
        assert_eq!(info.endpoints, vec!["https://a.example"]);
        assert_eq!(info.notices, vec!["maintenance"]);
    }

    #[test]
    fn test_tenant_info_defaults() {
        let info = normalize_tenant_info(&json!({"quota_per_unit": 0})).unwrap();
        assert_eq!(info, TenantInfo::default());
    }
}
