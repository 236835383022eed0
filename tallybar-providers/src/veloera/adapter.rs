//! Veloera payload normalization.
//!
//! Payloads match new-api, except that a token may belong to several groups
//! (`"vip,default"`). The first listed group is its billing group.

use serde_json::Value;
use tallybar_core::{Balance, Cost, TenantInfo, Token, TokenGroups};
use tallybar_fetch::FetchError;

use crate::newapi::adapter as newapi;

/// Normalizes `/api/user/self`.
///
/// # Errors
///
/// See [`newapi::normalize_balance`].
pub fn normalize_balance(raw: &Value) -> Result<Balance, FetchError> {
    newapi::normalize_balance(raw)
}

/// Normalizes `/api/data/self`.
///
/// # Errors
///
/// See [`newapi::normalize_costs`].
pub fn normalize_costs(raw: &Value) -> Result<Vec<Cost>, FetchError> {
    newapi::normalize_costs(raw)
}

/// Normalizes a token page.
///
/// # Errors
///
/// Returns a transformation error naming the first ill-typed field.
pub fn normalize_tokens(raw: &Value) -> Result<Vec<Token>, FetchError> {
    let mut tokens = newapi::normalize_tokens(raw)?;
    for token in &mut tokens {
        if let Some((first, _)) = token.group.split_once(',') {
            token.group = first.trim().to_string();
        }
    }
    Ok(tokens)
}

/// Normalizes `/api/user/self/groups`.
///
/// # Errors
///
/// See [`newapi::normalize_token_groups`].
pub fn normalize_token_groups(raw: &Value) -> Result<TokenGroups, FetchError> {
    newapi::normalize_token_groups(raw)
}

/// Normalizes `/api/status`.
///
/// # Errors
///
/// See [`newapi::normalize_tenant_info`].
pub fn normalize_tenant_info(raw: &Value) -> Result<TenantInfo, FetchError> {
    newapi::normalize_tenant_info(raw)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_multi_group_token_uses_first() {
        let raw = json!({"items": [{"key": "sk-x", "name": "a", "group": "vip, default"}]});
        let tokens = normalize_tokens(&raw).unwrap();
        assert_eq!(tokens[0].group, "vip");
        assert_eq!(tokens[0].secret_key, "sk-x");
    }

    #[test]
    fn test_display_in_currency() {
        let info = normalize_tenant_info(&json!({"display_in_currency": false})).unwrap();
        assert_eq!(info.display_format, "TOKENS");
        let info = normalize_tenant_info(&json!({"display_in_currency": true})).unwrap();
        assert_eq!(info.display_format, "USD");
    }
}
