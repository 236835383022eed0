//! Analytics normalization.
//!
//! Pure functions turning a balance and a list of cost entries into an
//! [`AnalyticsSnapshot`]. Nothing here performs I/O.

use std::collections::{BTreeMap, HashMap};

use tallybar_core::{
    AnalyticsSnapshot, Balance, Cost, EndpointUsage, ModelUsage, Period, UsagePoint, UsageSummary,
};

/// Default cap on the number of series points.
pub const DEFAULT_MAX_POINTS: usize = 1000;

// ============================================================================
// Series
// ============================================================================

/// Floors `timestamp` to the start of its bucket, or `None` if that start is
/// not representable.
fn bucket_of(timestamp: i64, width: i64) -> Option<i64> {
    timestamp.checked_sub(timestamp.rem_euclid(width))
}

/// Builds the gap-filled usage series for `period`.
///
/// Entries without a bucket timestamp are ignored. Zero points are inserted
/// only between the earliest and latest observed bucket, and the result is
/// downsampled to at most `max_points` points (`0` falls back to
/// [`DEFAULT_MAX_POINTS`]). The full walk is never materialized, so far-apart
/// outliers cost no more than `max_points` points.
pub fn build_series(costs: &[Cost], period: Period, max_points: usize) -> Vec<UsagePoint> {
    let width = period.bucket_secs();

    let mut buckets: BTreeMap<i64, UsagePoint> = BTreeMap::new();
    for cost in costs {
        let Some(bucket) = cost.bucket_start.and_then(|ts| bucket_of(ts, width)) else {
            continue;
        };
        let point = buckets
            .entry(bucket)
            .or_insert_with(|| UsagePoint::zero(bucket));
        point.requests += cost.request_count;
        point.cost += cost.credit_cost;
        point.tokens += cost.token_usage;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    // i128 keeps the span exact for any pair of i64 bucket starts
    let width = i128::from(width);
    let len = (i128::from(last) - i128::from(first)) / width + 1;
    let cap = if max_points == 0 { DEFAULT_MAX_POINTS } else { max_points };
    let count = usize::try_from(len).map_or(cap, |len| len.min(cap));

    (0..count)
        .map(|i| {
            // floor(i * len / count) over the gap-filled walk
            let index = i as i128 * len / count as i128;
            let ts = i64::try_from(i128::from(first) + index * width).unwrap_or(last);
            buckets.remove(&ts).unwrap_or_else(|| UsagePoint::zero(ts))
        })
        .collect()
}

// ============================================================================
// Breakdowns
// ============================================================================

#[derive(Default)]
struct Totals {
    requests: u64,
    cost: f64,
    tokens: u64,
}

impl Totals {
    fn add(&mut self, cost: &Cost) {
        self.requests += cost.request_count;
        self.cost += cost.credit_cost;
        self.tokens += cost.token_usage;
    }
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total } else { 0.0 }
}

fn by_cost_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}

/// Groups cost entries by model, cost descending.
pub fn model_breakdown(costs: &[Cost]) -> Vec<ModelUsage> {
    let mut groups: HashMap<&str, Totals> = HashMap::new();
    for cost in costs {
        groups.entry(cost.model_id.as_str()).or_default().add(cost);
    }
    let total = Cost::total_credit(costs);

    let mut models: Vec<ModelUsage> = groups
        .into_iter()
        .map(|(model_id, t)| ModelUsage {
            model_id: model_id.to_string(),
            requests: t.requests,
            cost: t.cost,
            tokens: t.tokens,
            share: share(t.cost, total),
        })
        .collect();
    models.sort_by(|a, b| by_cost_desc(a.cost, b.cost).then_with(|| a.model_id.cmp(&b.model_id)));
    models
}

/// Groups cost entries by billing endpoint, cost descending. Entries
/// without an endpoint are left out.
pub fn endpoint_breakdown(costs: &[Cost]) -> Vec<EndpointUsage> {
    let mut groups: HashMap<&str, Totals> = HashMap::new();
    let mut total = 0.0;
    for cost in costs {
        if let Some(endpoint) = cost.endpoint.as_deref() {
            groups.entry(endpoint).or_default().add(cost);
            total += cost.credit_cost;
        }
    }

    let mut endpoints: Vec<EndpointUsage> = groups
        .into_iter()
        .map(|(endpoint, t)| EndpointUsage {
            endpoint: endpoint.to_string(),
            requests: t.requests,
            cost: t.cost,
            tokens: t.tokens,
            share: share(t.cost, total),
        })
        .collect();
    endpoints.sort_by(|a, b| by_cost_desc(a.cost, b.cost).then_with(|| a.endpoint.cmp(&b.endpoint)));
    endpoints
}

// ============================================================================
// Snapshot
// ============================================================================

/// Totals for the period plus the balance at refresh time.
pub fn build_summary(balance: Balance, costs: &[Cost], series: &[UsagePoint]) -> UsageSummary {
    let mut totals = Totals::default();
    for cost in costs {
        totals.add(cost);
    }
    let mut models: Vec<&str> = costs.iter().map(|c| c.model_id.as_str()).collect();
    models.sort_unstable();
    models.dedup();

    UsageSummary {
        total_cost: totals.cost,
        total_tokens: totals.tokens,
        total_requests: totals.requests,
        remaining_credit: balance.remaining_credit,
        consumed_credit: balance.consumed_credit,
        model_count: models.len(),
        range_start: series.first().map(|p| p.timestamp),
        range_end: series.last().map(|p| p.timestamp),
    }
}

/// Builds the complete snapshot for `period`.
pub fn build_snapshot(
    period: Period,
    balance: Balance,
    costs: &[Cost],
    max_points: usize,
) -> AnalyticsSnapshot {
    let series = build_series(costs, period, max_points);
    AnalyticsSnapshot {
        period,
        summary: build_summary(balance, costs, &series),
        models: model_breakdown(costs),
        endpoints: endpoint_breakdown(costs),
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;
    const DAY: i64 = 86_400;

    #[test]
    fn test_series_floors_and_fills_gaps() {
        let base = 1_700_000_000 - 1_700_000_000 % HOUR;
        let costs = vec![
            Cost::new("a", 1.0, 10).with_requests(1).at(base + 5),
            Cost::new("b", 2.0, 20).with_requests(2).at(base + 1800),
            Cost::new("a", 4.0, 40).with_requests(4).at(base + 3 * HOUR + 10),
        ];

        let series = build_series(&costs, Period::OneDay, DEFAULT_MAX_POINTS);
        let stamps: Vec<i64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![base, base + HOUR, base + 2 * HOUR, base + 3 * HOUR]);
        assert_eq!(series[0].requests, 3);
        assert!((series[0].cost - 3.0).abs() < f64::EPSILON);
        assert!(series[1].is_zero());
        assert!(series[2].is_zero());
        assert_eq!(series[3].tokens, 40);
    }

    #[test]
    fn test_series_uses_day_buckets_for_long_periods() {
        let costs = vec![
            Cost::new("a", 1.0, 1).at(DAY * 10 + 5),
            Cost::new("a", 1.0, 1).at(DAY * 10 + 7 * HOUR),
            Cost::new("a", 1.0, 1).at(DAY * 12),
        ];
        let series = build_series(&costs, Period::SevenDays, DEFAULT_MAX_POINTS);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].timestamp, DAY * 10);
        assert!((series[0].cost - 2.0).abs() < f64::EPSILON);
        assert!(series[1].is_zero());
    }

    #[test]
    fn test_series_empty_and_unbucketed() {
        assert!(build_series(&[], Period::OneDay, DEFAULT_MAX_POINTS).is_empty());
        let costs = vec![Cost::new("a", 1.0, 1)];
        assert!(build_series(&costs, Period::OneDay, DEFAULT_MAX_POINTS).is_empty());
    }

    #[test]
    fn test_series_negative_timestamps_floor_down() {
        let costs = vec![Cost::new("a", 1.0, 1).at(-1)];
        let series = build_series(&costs, Period::OneDay, DEFAULT_MAX_POINTS);
        assert_eq!(series[0].timestamp, -HOUR);
    }

    #[test]
    fn test_series_capped_by_index_sampling() {
        let costs = vec![
            Cost::new("a", 1.0, 1).at(0),
            Cost::new("a", 1.0, 1).at(2499 * HOUR),
        ];
        let series = build_series(&costs, Period::OneDay, 1000);
        assert_eq!(series.len(), 1000);
        assert_eq!(series[0].timestamp, 0);
        // floor(999 * 2500 / 1000) = 2497
        assert_eq!(series[999].timestamp, 2497 * HOUR);
        assert_eq!(series[1].timestamp, 2 * HOUR);
    }

    #[test]
    fn test_series_survives_extreme_timestamps() {
        let costs = vec![Cost::new("a", 1.0, 1).at(i64::MAX)];
        let series = build_series(&costs, Period::OneDay, DEFAULT_MAX_POINTS);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].timestamp, i64::MAX - i64::MAX % HOUR);

        let costs = vec![Cost::new("a", 1.0, 1).at(i64::MIN)];
        assert!(build_series(&costs, Period::OneDay, DEFAULT_MAX_POINTS).is_empty());

        let costs = vec![
            Cost::new("a", 1.0, 1).at(i64::MIN + HOUR),
            Cost::new("b", 2.0, 1).at(i64::MAX),
        ];
        let series = build_series(&costs, Period::OneDay, 10);
        assert_eq!(series.len(), 10);
        assert!((series[0].cost - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_series_mixed_second_and_millisecond_stamps_stay_bounded() {
        let costs = vec![
            Cost::new("a", 1.0, 1).at(1_700_000_000),
            Cost::new("a", 1.0, 1).at(1_700_000_000_000),
        ];
        let series = build_series(&costs, Period::OneDay, DEFAULT_MAX_POINTS);
        assert_eq!(series.len(), DEFAULT_MAX_POINTS);
        assert_eq!(series[0].timestamp, 1_700_000_000 - 1_700_000_000 % HOUR);

        let series = build_series(&costs, Period::OneDay, 0);
        assert_eq!(series.len(), DEFAULT_MAX_POINTS);
    }

    #[test]
    fn test_model_breakdown_sorted_with_shares() {
        let costs = vec![
            Cost::new("small", 1.0, 1).with_requests(1),
            Cost::new("big", 3.0, 5).with_requests(2),
            Cost::new("big", 4.0, 5).with_requests(1),
        ];
        let models = model_breakdown(&costs);
        assert_eq!(models[0].model_id, "big");
        assert_eq!(models[0].requests, 3);
        assert!((models[0].share - 0.875).abs() < 1e-9);
        assert!((models[1].share - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_gives_zero_share() {
        let costs = vec![
            Cost::new("a", 0.0, 1).with_endpoint("key-1"),
            Cost::new("b", 0.0, 1),
        ];
        assert!(model_breakdown(&costs).iter().all(|m| m.share == 0.0));
        let endpoints = endpoint_breakdown(&costs);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].share, 0.0);
    }

    #[test]
    fn test_snapshot_summary() {
        let costs = vec![
            Cost::new("a", 2.0, 10).with_requests(1).at(HOUR),
            Cost::new("b", 3.0, 20).with_requests(4).at(3 * HOUR),
        ];
        let snapshot = build_snapshot(Period::OneDay, Balance::new(50.0, 7.0), &costs, DEFAULT_MAX_POINTS);
        let summary = &snapshot.summary;
        assert!((summary.total_cost - 5.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_tokens, 30);
        assert_eq!(summary.total_requests, 5);
        assert_eq!(summary.model_count, 2);
        assert!((summary.remaining_credit - 50.0).abs() < f64::EPSILON);
        assert_eq!(summary.range_start, Some(HOUR));
        assert_eq!(summary.range_end, Some(3 * HOUR));
        assert_eq!(snapshot.series.len(), 3);
    }

    #[test]
    fn test_empty_snapshot_matches_baseline_shape() {
        let snapshot = build_snapshot(Period::ThirtyDays, Balance::default(), &[], DEFAULT_MAX_POINTS);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.summary.range_start, None);
        assert_eq!(snapshot.period, Period::ThirtyDays);
    }
}
