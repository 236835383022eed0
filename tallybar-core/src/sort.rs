//! Tenant list sorting.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Balance, Tenant, TenantId};

/// Field the tenant list is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// User-defined (drag) order.
    #[default]
    Manual,
    /// Tenant name.
    Name,
    /// Remaining balance.
    Balance,
    /// Consumed quota.
    Consumed,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// Persisted sort preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TenantSortConfig {
    /// Sort field.
    pub field: SortField,
    /// Sort direction (ignored for manual order).
    pub direction: SortDirection,
    /// Tenant ids in manual order. Unlisted tenants keep their list order
    /// after the listed ones.
    pub manual_order: Vec<TenantId>,
}

/// Returns a sorted copy of `tenants`.
///
/// Tenants whose balance value is missing or NaN always sort last, in both
/// directions. Equal values fall back to case-insensitive name order.
pub fn sort_tenants(
    tenants: &[Tenant],
    balances: &HashMap<TenantId, Balance>,
    config: &TenantSortConfig,
) -> Vec<Tenant> {
    let mut sorted = tenants.to_vec();

    match config.field {
        SortField::Manual => {
            let rank: HashMap<&str, usize> = config
                .manual_order
                .iter()
                .enumerate()
                .map(|(i, id)| (id.as_str(), i))
                .collect();
            // stable sort keeps unlisted tenants in list order
            sorted.sort_by_key(|t| rank.get(t.id.as_str()).copied().unwrap_or(usize::MAX));
        }
        SortField::Name => {
            sorted.sort_by(|a, b| {
                let ord = compare_names(a, b);
                apply_direction(ord, config.direction)
            });
        }
        SortField::Balance | SortField::Consumed => {
            let value = |t: &Tenant| -> Option<f64> {
                let balance = balances.get(&t.id)?;
                let v = if config.field == SortField::Balance {
                    balance.remaining_credit
                } else {
                    balance.consumed_credit
                };
                (!v.is_nan()).then_some(v)
            };
            sorted.sort_by(|a, b| match (value(a), value(b)) {
                (Some(x), Some(y)) => apply_direction(x.total_cmp(&y), config.direction)
                    .then_with(|| compare_names(a, b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => compare_names(a, b),
            });
        }
    }

    sorted
}

fn compare_names(a: &Tenant, b: &Tenant) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn apply_direction(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlatformType;

    fn tenant(id: &str, name: &str) -> Tenant {
        let mut t = Tenant::new(name, "https://x.example", "t", PlatformType::NewApi);
        t.id = id.to_string();
        t
    }

    fn names(list: &[Tenant]) -> Vec<&str> {
        list.iter().map(|t| t.name.as_str()).collect()
    }

    fn fixture() -> (Vec<Tenant>, HashMap<TenantId, Balance>) {
        let tenants = vec![
            tenant("1", "delta"),
            tenant("2", "alpha"),
            tenant("3", "charlie"),
            tenant("4", "bravo"),
            tenant("5", "echo"),
        ];
        let mut balances = HashMap::new();
        balances.insert("1".to_string(), Balance::new(50.0, 0.0));
        balances.insert("2".to_string(), Balance::new(f64::NAN, 0.0));
        balances.insert("3".to_string(), Balance::new(10.0, 0.0));
        balances.insert("4".to_string(), Balance::new(50.0, 0.0));
        // "5" has no balance at all
        (tenants, balances)
    }

    #[test]
    fn test_balance_asc_missing_last() {
        let (tenants, balances) = fixture();
        let config = TenantSortConfig {
            field: SortField::Balance,
            direction: SortDirection::Asc,
            ..Default::default()
        };
        let sorted = sort_tenants(&tenants, &balances, &config);
        assert_eq!(names(&sorted), vec!["charlie", "bravo", "delta", "alpha", "echo"]);
    }

    #[test]
    fn test_balance_desc_missing_still_last() {
        let (tenants, balances) = fixture();
        let config = TenantSortConfig {
            field: SortField::Balance,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        let sorted = sort_tenants(&tenants, &balances, &config);
        assert_eq!(names(&sorted), vec!["bravo", "delta", "charlie", "alpha", "echo"]);
    }

    #[test]
    fn test_manual_order() {
        let (tenants, balances) = fixture();
        let config = TenantSortConfig {
            field: SortField::Manual,
            manual_order: vec!["3".to_string(), "1".to_string()],
            ..Default::default()
        };
        let sorted = sort_tenants(&tenants, &balances, &config);
        assert_eq!(names(&sorted), vec!["charlie", "delta", "alpha", "bravo", "echo"]);
    }

    #[test]
    fn test_name_desc() {
        let (tenants, balances) = fixture();
        let config = TenantSortConfig {
            field: SortField::Name,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        let sorted = sort_tenants(&tenants, &balances, &config);
        assert_eq!(names(&sorted), vec!["echo", "delta", "charlie", "bravo", "alpha"]);
    }
}
