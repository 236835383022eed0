//! Analytics view models.
//!
//! These are derived from balances and costs; nothing owns them except the
//! analytics store. [`AnalyticsSnapshot::empty`] is the zeroed baseline the
//! view falls back to on error, so every field is always defined.

use serde::{Deserialize, Serialize};

use super::usage::Period;

// ============================================================================
// Summary
// ============================================================================

/// Aggregated totals for one period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    /// Total quota spent in the period.
    pub total_cost: f64,
    /// Total tokens in the period.
    pub total_tokens: u64,
    /// Total requests in the period.
    pub total_requests: u64,
    /// Remaining quota at refresh time.
    pub remaining_credit: f64,
    /// Lifetime consumed quota at refresh time.
    pub consumed_credit: f64,
    /// Number of distinct models.
    pub model_count: usize,
    /// Earliest observed bucket (Unix seconds).
    pub range_start: Option<i64>,
    /// Latest observed bucket (Unix seconds).
    pub range_end: Option<i64>,
}

impl UsageSummary {
    /// Average quota per request, 0 when there were no requests.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_cost_per_request(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_cost / self.total_requests as f64
        }
    }
}

// ============================================================================
// Series
// ============================================================================

/// One point of the usage time series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePoint {
    /// Bucket start (Unix seconds).
    pub timestamp: i64,
    /// Requests in the bucket.
    pub requests: u64,
    /// Quota spent in the bucket.
    pub cost: f64,
    /// Tokens in the bucket.
    pub tokens: u64,
}

impl UsagePoint {
    /// A zero-valued point for a gap.
    pub fn zero(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// Returns true if every value is zero.
    pub fn is_zero(&self) -> bool {
        self.requests == 0 && self.tokens == 0 && self.cost == 0.0
    }
}

// ============================================================================
// Breakdowns
// ============================================================================

/// Usage grouped by model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    /// Model identifier.
    pub model_id: String,
    /// Requests.
    pub requests: u64,
    /// Quota spent.
    pub cost: f64,
    /// Tokens.
    pub tokens: u64,
    /// Share of total cost in `[0, 1]`.
    pub share: f64,
}

/// Usage grouped by billing endpoint (key or channel).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUsage {
    /// Endpoint label.
    pub endpoint: String,
    /// Requests.
    pub requests: u64,
    /// Quota spent.
    pub cost: f64,
    /// Tokens.
    pub tokens: u64,
    /// Share of total cost in `[0, 1]`.
    pub share: f64,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything the analytics view renders for one period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    /// Period the snapshot covers.
    pub period: Period,
    /// Totals.
    pub summary: UsageSummary,
    /// Gap-filled time series.
    pub series: Vec<UsagePoint>,
    /// Per-model breakdown, cost descending.
    pub models: Vec<ModelUsage>,
    /// Per-endpoint breakdown, cost descending.
    pub endpoints: Vec<EndpointUsage>,
}

impl AnalyticsSnapshot {
    /// The zeroed baseline for a period.
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Returns true if no usage was observed.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.models.is_empty()
    }
}

/// Loading state of the analytics view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "message")]
pub enum AnalyticsStatus {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// First load for this period in progress.
    Loading,
    /// Data is displayed.
    Ready,
    /// The last refresh failed.
    Error(String),
}
