//! API token types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token groups keyed by group name.
pub type TokenGroups = BTreeMap<String, TokenGroup>;

/// One API key registered on a tenant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// The secret key (as returned by the platform, possibly masked).
    pub secret_key: String,
    /// User-facing label.
    pub label: String,
    /// Quota consumed through this key.
    pub credit_consumed: f64,
    /// Unix seconds of last use.
    pub last_used_at: Option<i64>,
    /// Token group name (empty for the default group).
    pub group: String,
}

impl Token {
    /// Returns the key with everything but the prefix and last four
    /// characters hidden.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.secret_key.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}****{tail}")
    }
}

/// Pricing group a token can belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGroup {
    /// Description (empty when the platform gives none).
    pub description: String,
    /// Credit cost multiplier (1.0 when unknown).
    pub multiplier: f64,
}

impl Default for TokenGroup {
    fn default() -> Self {
        Self {
            description: String::new(),
            multiplier: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_key() {
        let token = Token {
            secret_key: "sk-abcdefghijklmnop".to_string(),
            ..Default::default()
        };
        assert_eq!(token.masked_key(), "sk-a****mnop");

        let short = Token {
            secret_key: "abc".to_string(),
            ..Default::default()
        };
        assert_eq!(short.masked_key(), "***");
    }

    #[test]
    fn test_group_defaults() {
        let group = TokenGroup::default();
        assert_eq!(group.multiplier, 1.0);
        assert!(group.description.is_empty());
    }
}
