//! License service-plan helpers.

use std::collections::BTreeSet;
use tracing::warn;

use crate::directory::ServicePlan;

/// Requested plan names resolved against a SKU catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanResolution {
    /// Plan IDs that matched a requested name.
    pub ids: BTreeSet<String>,
    /// Requested names absent from the SKU.
    pub unknown: Vec<String>,
}

/// Merges the disabled plans of one entity.
///
/// The result is `(current ∩ sku_plans) ∪ requested`. Plans already disabled
/// within the SKU are always kept; this never re-enables anything.
#[must_use]
pub fn merge_disabled_plans(
    current: &BTreeSet<String>,
    sku_plans: &BTreeSet<String>,
    requested: &BTreeSet<String>,
) -> BTreeSet<String> {
    current
        .intersection(sku_plans)
        .chain(requested.iter())
        .cloned()
        .collect()
}

/// Maps requested plan names to IDs using a SKU catalog.
///
/// Names are matched case-insensitively. Unknown names are logged and
/// returned in [`PlanResolution::unknown`] rather than failing the run.
#[must_use]
pub fn resolve_plan_names(sku: &str, catalog: &[ServicePlan], names: &[String]) -> PlanResolution {
    let mut resolution = PlanResolution::default();

    for name in names {
        match catalog.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(plan) => {
                resolution.ids.insert(plan.id.clone());
            }
            None => {
                warn!("Service plan '{name}' is not part of SKU {sku}; ignoring it");
                resolution.unknown.push(name.clone());
            }
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn catalog() -> Vec<ServicePlan> {
        vec![
            ServicePlan {
                id: String::from("efb87545"),
                name: String::from("EXCHANGE_S_ENTERPRISE"),
            },
            ServicePlan {
                id: String::from("5dbe027f"),
                name: String::from("SHAREPOINTENTERPRISE"),
            },
            ServicePlan {
                id: String::from("57ff2da0"),
                name: String::from("TEAMS1"),
            },
        ]
    }

    #[test]
    fn test_merge_is_monotonic() {
        let sku = set(&["a", "b", "c", "d"]);
        let cases = [
            (set(&[]), set(&[])),
            (set(&["a"]), set(&[])),
            (set(&[]), set(&["b"])),
            (set(&["a", "c"]), set(&["b", "c"])),
            (set(&["a", "b", "c", "d"]), set(&["d"])),
        ];

        for (current, requested) in &cases {
            let merged = merge_disabled_plans(current, &sku, requested);
            assert!(current.is_subset(&merged), "dropped {current:?}");
            assert!(requested.is_subset(&merged), "missed {requested:?}");
        }
    }

    #[test]
    fn test_merge_drops_plans_outside_sku() {
        let merged = merge_disabled_plans(&set(&["a", "stale"]), &set(&["a", "b"]), &set(&["b"]));
        assert_eq!(merged, set(&["a", "b"]));
    }

    #[test]
    fn test_resolve_plan_names() {
        let names = vec![String::from("teams1"), String::from("EXCHANGE_S_ENTERPRISE")];
        let resolution = resolve_plan_names("E3", &catalog(), &names);

        assert_eq!(resolution.ids, set(&["57ff2da0", "efb87545"]));
        assert!(resolution.unknown.is_empty());
    }

    #[test]
    fn test_unknown_plan_is_reported_not_fatal() {
        let names = vec![String::from("YAMMER_ENTERPRISE"), String::from("TEAMS1")];
        let resolution = resolve_plan_names("E3", &catalog(), &names);

        assert_eq!(resolution.ids, set(&["57ff2da0"]));
        assert_eq!(resolution.unknown, vec![String::from("YAMMER_ENTERPRISE")]);
    }
}
