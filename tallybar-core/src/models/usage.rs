//! Balance, cost and period types.
//!
//! All credit values are raw platform quota units, not currency. Use
//! [`crate::currency`] to convert for display.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Balance
// ============================================================================

/// Remaining and consumed quota for one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Quota still available.
    pub remaining_credit: f64,
    /// Quota used so far.
    pub consumed_credit: f64,
}

impl Balance {
    /// Creates a new balance.
    pub fn new(remaining_credit: f64, consumed_credit: f64) -> Self {
        Self {
            remaining_credit,
            consumed_credit,
        }
    }

    /// Returns remaining + consumed.
    pub fn total_credit(&self) -> f64 {
        self.remaining_credit + self.consumed_credit
    }
}

// ============================================================================
// Cost
// ============================================================================

/// One cost entry: a model, optionally within a time bucket.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    /// Model identifier.
    pub model_id: String,
    /// Quota spent.
    pub credit_cost: f64,
    /// Tokens consumed (prompt + completion).
    pub token_usage: u64,
    /// Number of requests.
    #[serde(default)]
    pub request_count: u64,
    /// Unix seconds of the bucket/record this entry belongs to, if known.
    #[serde(default)]
    pub bucket_start: Option<i64>,
    /// Key or channel the usage was billed through, if the platform reports it.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Cost {
    /// Creates a cost entry without bucket or endpoint information.
    pub fn new(model_id: impl Into<String>, credit_cost: f64, token_usage: u64) -> Self {
        Self {
            model_id: model_id.into(),
            credit_cost,
            token_usage,
            request_count: 0,
            bucket_start: None,
            endpoint: None,
        }
    }

    /// Sets the bucket timestamp.
    #[must_use]
    pub fn at(mut self, bucket_start: i64) -> Self {
        self.bucket_start = Some(bucket_start);
        self
    }

    /// Sets the request count.
    #[must_use]
    pub fn with_requests(mut self, request_count: u64) -> Self {
        self.request_count = request_count;
        self
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sums the credit cost of a slice of entries.
    pub fn total_credit(costs: &[Cost]) -> f64 {
        costs.iter().map(|c| c.credit_cost).sum()
    }
}

// ============================================================================
// Period
// ============================================================================

/// Cost/analytics lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Period {
    /// Today only.
    #[serde(rename = "1d")]
    #[default]
    OneDay,
    /// Last 7 days including today.
    #[serde(rename = "7d")]
    SevenDays,
    /// Last 14 days including today.
    #[serde(rename = "14d")]
    FourteenDays,
    /// Last 30 days including today.
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl Period {
    /// Number of calendar days covered.
    pub fn days(&self) -> u32 {
        match self {
            Self::OneDay => 1,
            Self::SevenDays => 7,
            Self::FourteenDays => 14,
            Self::ThirtyDays => 30,
        }
    }

    /// Short label (`1d`, `7d`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::SevenDays => "7d",
            Self::FourteenDays => "14d",
            Self::ThirtyDays => "30d",
        }
    }

    /// Width in seconds of the analytics time bucket for this period.
    pub fn bucket_secs(&self) -> i64 {
        match self {
            Self::OneDay => 3_600,
            _ => 86_400,
        }
    }

    /// All periods.
    pub fn all() -> &'static [Period] {
        &[
            Self::OneDay,
            Self::SevenDays,
            Self::FourteenDays,
            Self::ThirtyDays,
        ]
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| CoreError::InvalidConfig(format!("unknown period: {s}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_days() {
        let days: Vec<u32> = Period::all().iter().map(Period::days).collect();
        assert_eq!(days, vec![1, 7, 14, 30]);
    }

    #[test]
    fn test_period_bucket_width() {
        assert_eq!(Period::OneDay.bucket_secs(), 3_600);
        assert_eq!(Period::ThirtyDays.bucket_secs(), 86_400);
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("14d".parse::<Period>().unwrap(), Period::FourteenDays);
        assert!("2d".parse::<Period>().is_err());
    }

    #[test]
    fn test_cost_total() {
        let costs = vec![Cost::new("a", 1.5, 10), Cost::new("b", 2.5, 20)];
        assert_eq!(Cost::total_credit(&costs), 4.0);
        assert_eq!(Cost::total_credit(&[]), 0.0);
    }
}
