//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

use chrono::Utc;
use tallybar_core::{
    AnalyticsSnapshot, Balance, EndpointUsage, ModelUsage, Period, PlatformType, Tenant,
    TenantInfo, Token, TokenGroup, TokenGroups, UsagePoint, UsageSummary,
};
use tallybar_engine::{EngineError, TenantRefresh};
use tallybar_fetch::FetchError;

use super::{JsonFormatter, RefreshRow, TenantRow, TextFormatter};

fn row(name: &str, balance: Option<Balance>, selected: bool) -> TenantRow {
    TenantRow {
        tenant: Tenant::new(name, format!("https://{name}.example"), "sk-1", PlatformType::OneHub),
        balance,
        info: TenantInfo {
            credit_unit: 100.0,
            ..TenantInfo::default()
        },
        selected,
        updated_at: None,
    }
}

fn snapshot() -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        period: Period::SevenDays,
        summary: UsageSummary {
            total_cost: 300.0,
            total_tokens: 12_000,
            total_requests: 30,
            remaining_credit: 700.0,
            consumed_credit: 300.0,
            model_count: 2,
            range_start: Some(1_700_000_000),
            range_end: Some(1_700_003_600),
        },
        series: vec![
            UsagePoint {
                timestamp: 1_700_000_000,
                requests: 10,
                cost: 100.0,
                tokens: 4_000,
            },
            UsagePoint::zero(1_700_001_800),
            UsagePoint {
                timestamp: 1_700_003_600,
                requests: 20,
                cost: 200.0,
                tokens: 8_000,
            },
        ],
        models: vec![
            ModelUsage {
                model_id: "gpt-4o".to_string(),
                requests: 20,
                cost: 200.0,
                tokens: 8_000,
                share: 2.0 / 3.0,
            },
            ModelUsage {
                model_id: "claude-3-haiku".to_string(),
                requests: 10,
                cost: 100.0,
                tokens: 4_000,
                share: 1.0 / 3.0,
            },
        ],
        endpoints: vec![EndpointUsage {
            endpoint: "/v1/chat/completions".to_string(),
            requests: 30,
            cost: 300.0,
            tokens: 12_000,
            share: 1.0,
        }],
    }
}

fn tokens() -> (Vec<Token>, TokenGroups) {
    let tokens = vec![
        Token {
            secret_key: "sk-abcdefghijkl".to_string(),
            label: "laptop".to_string(),
            credit_consumed: 250.0,
            last_used_at: Some(1_700_000_000),
            group: "vip".to_string(),
        },
        Token {
            secret_key: "sk-zyxwvutsrqpo".to_string(),
            label: "ci".to_string(),
            credit_consumed: 0.0,
            last_used_at: None,
            group: String::new(),
        },
    ];
    let mut groups = TokenGroups::new();
    groups.insert(
        "vip".to_string(),
        TokenGroup {
            description: "Priority".to_string(),
            multiplier: 1.5,
        },
    );
    (tokens, groups)
}

#[cfg(test)]
mod text_formatter_tests {
    use super::*;

    #[test]
    fn test_tenants_list() {
        let formatter = TextFormatter::new(false);
        let rows = vec![
            row("work", Some(Balance::new(750.0, 250.0)), true),
            row("home", None, false),
        ];
        let output = formatter.format_tenants(&rows);

        assert!(output.starts_with("Tenants"));
        let work = output.lines().find(|l| l.contains("work")).unwrap();
        assert!(work.starts_with('●'));
        assert!(work.contains("onehub"));
        assert!(work.contains("$7.50"));
        assert!(work.contains("████████░░"));
        let home = output.lines().find(|l| l.contains("home")).unwrap();
        assert!(home.contains("no data"));
    }

    #[test]
    fn test_tenants_empty() {
        let formatter = TextFormatter::new(false);
        assert!(formatter.format_tenants(&[]).contains("tallybar tenants add"));
    }

    #[test]
    fn test_refresh_with_errors() {
        let formatter = TextFormatter::new(false);
        let refresh = RefreshRow {
            tenant_id: "t1".to_string(),
            tenant_name: "work".to_string(),
            info: TenantInfo {
                credit_unit: 100.0,
                ..TenantInfo::default()
            },
            balance: Some(Balance::new(500.0, 150.0)),
            today_usage: None,
            errors: vec![("costs", "Unauthorized".to_string())],
        };
        let output = formatter.format_refresh(&refresh);

        assert!(output.contains("Balance:  $5.00 left, $1.50 used"));
        assert!(!output.contains("Today:"));
        assert!(output.contains("✗ costs: Unauthorized"));
    }

    #[test]
    fn test_analytics() {
        let formatter = TextFormatter::new(false);
        let info = TenantInfo {
            credit_unit: 100.0,
            ..TenantInfo::default()
        };
        let output = formatter.format_analytics("work", &snapshot(), &info);

        assert!(output.contains("work Usage Analytics (7d)"));
        assert!(output.contains("Total cost:   $3.00"));
        assert!(output.contains("Per request:  $0.10"));
        assert!(output.contains("gpt-4o"));
        assert!(output.contains("66.7%"));
        assert!(output.contains("/v1/chat/completions"));
        // models are listed in the given (cost descending) order
        assert!(output.find("gpt-4o").unwrap() < output.find("claude-3-haiku").unwrap());
    }

    #[test]
    fn test_analytics_empty() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_analytics(
            "work",
            &AnalyticsSnapshot::empty(Period::OneDay),
            &TenantInfo::default(),
        );
        assert!(output.contains("No usage in this period"));
    }

    #[test]
    fn test_sparkline() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.sparkline(&[]), "");
        assert_eq!(formatter.sparkline(&[0.0, 0.0]), "▁▁");
        assert_eq!(formatter.sparkline(&[100.0, 0.0, 200.0]), "▅▁█");

        let long: Vec<f64> = (0..480).map(f64::from).collect();
        assert_eq!(formatter.sparkline(&long).chars().count(), 48);
    }

    #[test]
    fn test_tokens() {
        let formatter = TextFormatter::new(false);
        let (tokens, groups) = tokens();
        let info = TenantInfo {
            credit_unit: 100.0,
            ..TenantInfo::default()
        };
        let output = formatter.format_tokens(&tokens, &groups, &info);

        let laptop = output.lines().find(|l| l.starts_with("laptop")).unwrap();
        assert!(laptop.contains("sk-a****ijkl"));
        assert!(laptop.contains("vip ×1.5"));
        assert!(laptop.contains("$2.50"));
        let ci = output.lines().find(|l| l.starts_with("ci")).unwrap();
        assert!(ci.contains("default"));
        assert!(ci.contains("never"));

        assert_eq!(formatter.format_tokens(&[], &groups, &info), "No tokens");
    }

    #[test]
    fn test_badge_and_error() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.format_badge(Some("1.2k")), "Badge: 1.2k");
        assert_eq!(formatter.format_badge(None), "Badge: (hidden)");
        assert_eq!(
            formatter.format_error("work", "Unauthorized"),
            "work: Error - Unauthorized"
        );
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::*;

    #[test]
    fn test_tenants_json() {
        let formatter = JsonFormatter::new(false);
        let mut work = row("work", Some(Balance::new(750.0, 250.0)), true);
        work.updated_at = Some(Utc::now());
        let output = formatter.format_tenants(&[work, row("home", None, false)]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed[0]["name"], "work");
        assert_eq!(parsed[0]["platform"], "onehub");
        assert_eq!(parsed[0]["selected"], true);
        assert_eq!(parsed[0]["balance"]["remaining"], 7.5);
        assert_eq!(parsed[0]["balance"]["remainingCredit"], 750.0);
        assert!(parsed[0]["updatedAt"].is_string());
        assert!(parsed[1].get("balance").is_none());
        // credentials are never printed
        assert!(!output.contains("sk-1"));
    }

    #[test]
    fn test_single_refresh_is_object() {
        let formatter = JsonFormatter::new(false);
        let refresh = RefreshRow {
            tenant_id: "t1".to_string(),
            tenant_name: "work".to_string(),
            info: TenantInfo {
                credit_unit: 100.0,
                ..TenantInfo::default()
            },
            balance: None,
            today_usage: Some(125.0),
            errors: vec![("balance", "Unauthorized".to_string())],
        };

        let output = formatter.format_refresh(std::slice::from_ref(&refresh)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["tenantId"], "t1");
        assert_eq!(parsed["todayUsage"], 1.25);
        assert_eq!(parsed["errors"][0]["domain"], "balance");

        let output = formatter.format_refresh(&[refresh.clone(), refresh]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_analytics_json_flattens_snapshot() {
        let formatter = JsonFormatter::new(true);
        let output = formatter
            .format_analytics("t1", "work", &snapshot(), &TenantInfo::default())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["tenantName"], "work");
        assert_eq!(parsed["currency"], "$");
        assert_eq!(parsed["period"], "7d");
        assert_eq!(parsed["series"].as_array().unwrap().len(), 3);
        assert_eq!(parsed["models"][0]["modelId"], "gpt-4o");
    }

    #[test]
    fn test_tokens_json() {
        let formatter = JsonFormatter::new(false);
        let (tokens, groups) = tokens();
        let output = formatter
            .format_tokens(&tokens, &groups, &TenantInfo::default())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed[0]["key"], "sk-a****ijkl");
        assert_eq!(parsed[0]["multiplier"], 1.5);
        assert!(parsed[0]["lastUsedAt"].as_str().unwrap().starts_with("2023-11-14"));
        assert!(parsed[1].get("multiplier").is_none());
        assert!(parsed[1].get("lastUsedAt").is_none());
        assert!(!output.contains("sk-abcdefghijkl"));
    }
}

#[cfg(test)]
mod refresh_row_tests {
    use super::*;

    #[test]
    fn test_silent_errors_are_dropped() {
        let refresh = TenantRefresh {
            tenant_id: "t1".to_string(),
            tenant_name: "work".to_string(),
            balance: Err(EngineError::from(
                FetchError::RateLimited { until: Utc::now() }.in_platform("newapi", "fetch_balance"),
            )),
            costs: Ok(Vec::new()),
            tenant_info: Err(EngineError::TenantNotFound("t1".to_string())),
        };
        let cached = TenantInfo {
            credit_unit: 42.0,
            ..TenantInfo::default()
        };

        let row = RefreshRow::new(refresh, cached.clone());
        assert_eq!(row.balance, None);
        assert_eq!(row.today_usage, Some(0.0));
        assert_eq!(row.info, cached);
        assert_eq!(row.errors.len(), 1);
        assert_eq!(row.errors[0].0, "tenant_info");
    }
}
