//! Integration tests for core model types.

use std::collections::HashMap;

use tallybar_core::{
    AnalyticsSnapshot, Balance, Cost, Period, PlatformType, SortField, Tenant, TenantSortConfig,
    quota_to_currency, sort_tenants,
};

#[test]
fn test_snapshot_serialization_roundtrip() {
    let snapshot = AnalyticsSnapshot::empty(Period::SevenDays);
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: AnalyticsSnapshot = serde_json::from_str(&json).unwrap();
    assert!(parsed.is_empty());
    assert_eq!(parsed.period, Period::SevenDays);
}

#[test]
fn test_tenant_list_persisted_shape() {
    let tenants = vec![
        Tenant::new("A", "https://a.example", "sk-a", PlatformType::NewApi).with_user_id("1"),
        Tenant::new("B", "https://b.example", "cookie", PlatformType::Veloera).with_user_id("2"),
    ];
    let json = serde_json::to_string(&tenants).unwrap();
    let parsed: Vec<Tenant> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, tenants);
}

#[test]
fn test_cost_totals_in_display_currency() {
    let costs = vec![
        Cost::new("gpt-4o", 250_000.0, 1_000).with_requests(3),
        Cost::new("claude", 250_000.0, 2_000).with_requests(1),
    ];
    let total = Cost::total_credit(&costs);
    assert!((quota_to_currency(total, 500_000.0) - 1.0).abs() < 1e-12);
}

#[test]
fn test_sort_by_consumed_desc() {
    let a = Tenant::new("a", "https://a.example", "t", PlatformType::NewApi);
    let b = Tenant::new("b", "https://b.example", "t", PlatformType::NewApi);
    let mut balances = HashMap::new();
    balances.insert(a.id.clone(), Balance::new(0.0, 10.0));
    balances.insert(b.id.clone(), Balance::new(0.0, 20.0));

    let config = TenantSortConfig {
        field: SortField::Consumed,
        direction: tallybar_core::SortDirection::Desc,
        ..Default::default()
    };
    let sorted = sort_tenants(&[a, b], &balances, &config);
    assert_eq!(sorted[0].name, "b");
}
