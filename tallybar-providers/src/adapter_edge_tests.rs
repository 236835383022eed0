//! Adapter edge case and error handling tests.
//!
//! These tests feed every platform's adapter empty, partial and ill-typed
//! payloads.

#[cfg(test)]
mod empty_payload_tests {
    use serde_json::{Value, json};

    use crate::{newapi, oneapi, onehub, veloera};

    // ========================================================================
    // Null and Empty
    // ========================================================================

    #[test]
    fn test_null_balance_is_zero_everywhere() {
        for balance in [
            newapi::adapter::normalize_balance(&Value::Null).unwrap(),
            oneapi::adapter::normalize_balance(&Value::Null).unwrap(),
            onehub::adapter::normalize_balance(&Value::Null).unwrap(),
            veloera::adapter::normalize_balance(&Value::Null).unwrap(),
        ] {
            assert_eq!(balance.remaining_credit, 0.0);
            assert_eq!(balance.consumed_credit, 0.0);
        }
    }

    #[test]
    fn test_empty_costs() {
        assert!(newapi::adapter::normalize_costs(&json!([])).unwrap().is_empty());
        assert!(oneapi::adapter::normalize_costs(&Value::Null).unwrap().is_empty());
        assert!(onehub::adapter::normalize_costs(&json!([])).unwrap().is_empty());
        assert!(veloera::adapter::normalize_costs(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tokens() {
        assert!(newapi::adapter::normalize_tokens(&json!({})).unwrap().is_empty());
        assert!(oneapi::adapter::normalize_tokens(&json!([])).unwrap().is_empty());
        assert!(onehub::adapter::normalize_tokens(&json!({"data": null})).unwrap().is_empty());
        assert!(veloera::adapter::normalize_tokens(&json!({"items": []})).unwrap().is_empty());
    }

    #[test]
    fn test_empty_status_uses_defaults() {
        for info in [
            newapi::adapter::normalize_tenant_info(&json!({})).unwrap(),
            oneapi::adapter::normalize_tenant_info(&json!({})).unwrap(),
            onehub::adapter::normalize_tenant_info(&json!({})).unwrap(),
        ] {
            assert_eq!(info.credit_unit, tallybar_core::DEFAULT_CREDIT_UNIT);
            assert_eq!(info.exchange_rate, 1.0);
            assert_eq!(info.display_format, "USD");
        }
    }
}

#[cfg(test)]
mod malformed_payload_tests {
    use serde_json::json;
    use tallybar_fetch::FetchError;

    use crate::{newapi, oneapi, onehub};

    fn field(err: FetchError) -> String {
        match err {
            FetchError::Transformation { field, .. } => field,
            other => panic!("expected transformation error, got {other}"),
        }
    }

    // ========================================================================
    // Wrong Types
    // ========================================================================

    #[test]
    fn test_balance_object_quota() {
        let err = newapi::adapter::normalize_balance(&json!({"quota": {"v": 1}})).unwrap_err();
        assert_eq!(field(err), "user.quota");
    }

    #[test]
    fn test_balance_not_object() {
        let err = oneapi::adapter::normalize_balance(&json!([1, 2])).unwrap_err();
        assert_eq!(field(err), "user");
    }

    #[test]
    fn test_cost_row_not_object() {
        let err = newapi::adapter::normalize_costs(&json!([{"quota": 1}, "x"])).unwrap_err();
        assert_eq!(field(err), "quota_data[1]");
    }

    #[test]
    fn test_log_quota_not_numeric() {
        let err = oneapi::adapter::normalize_costs(&json!([{"quota": "lots"}])).unwrap_err();
        assert_eq!(field(err), "logs[0].quota");
    }

    #[test]
    fn test_balance_nan_string_rejected() {
        let err = newapi::adapter::normalize_balance(&json!({"quota": "NaN", "used_quota": 1}))
            .unwrap_err();
        assert_eq!(field(err), "user.quota");
    }

    #[test]
    fn test_dashboard_not_array() {
        let err = onehub::adapter::normalize_costs(&json!({"rows": []})).unwrap_err();
        assert_eq!(field(err), "dashboard");
    }

    // ========================================================================
    // Lenient Values
    // ========================================================================

    #[test]
    fn test_numeric_strings_accepted() {
        let balance =
            newapi::adapter::normalize_balance(&json!({"quota": "1500", "used_quota": ""}))
                .unwrap();
        assert_eq!(balance.remaining_credit, 1500.0);
        assert_eq!(balance.consumed_credit, 0.0);
    }

    #[test]
    fn test_negative_counts_clamped() {
        let costs =
            oneapi::adapter::normalize_costs(&json!([{"prompt_tokens": -5, "completion_tokens": 3}]))
                .unwrap();
        assert_eq!(costs[0].token_usage, 3);
    }

    #[test]
    fn test_non_positive_credit_unit_ignored() {
        let info = newapi::adapter::normalize_tenant_info(&json!({"quota_per_unit": 0})).unwrap();
        assert_eq!(info.credit_unit, tallybar_core::DEFAULT_CREDIT_UNIT);
        let info = onehub::adapter::normalize_tenant_info(&json!({"quota_per_unit": -3})).unwrap();
        assert_eq!(info.credit_unit, tallybar_core::DEFAULT_CREDIT_UNIT);
    }
}
