//! Target states and the rules that compute them.
//!
//! A [`TargetState`] is an immutable description of what an entity should
//! look like after reconciliation. A [`TargetPlanner`] computes one per
//! entity; [`TargetRule`] is the planner driven by configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::directory::Entity;
use crate::error::{ReconcileError, Result};

use super::license::merge_disabled_plans;

/// Desired state for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetState {
    /// A single attribute value (e.g. a tools upgrade policy).
    Attribute {
        /// Attribute name.
        name: String,
        /// Desired value.
        value: String,
    },
    /// Move the entity into another container.
    Relocate {
        /// Destination container.
        container: String,
    },
    /// Full set of disabled plans for a license SKU.
    PlanSet {
        /// License SKU.
        sku: String,
        /// Disabled plan IDs after the merge.
        disabled: BTreeSet<String>,
    },
}

impl TargetState {
    /// Returns true if the entity snapshot already matches this target.
    #[must_use]
    pub fn is_satisfied_by(&self, entity: &Entity) -> bool {
        match self {
            Self::Attribute { name, value } => entity.attribute(name) == Some(value.as_str()),
            Self::Relocate { container } => entity
                .container
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(container)),
            Self::PlanSet { sku, disabled } => entity
                .license(sku)
                .is_some_and(|(_, current)| disabled.is_subset(current)),
        }
    }

    /// Returns a short human-readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Attribute { name, value } => format!("set {name} = {value}"),
            Self::Relocate { container } => format!("move to {container}"),
            Self::PlanSet { sku, disabled } => {
                format!("disable {} plan(s) in {sku}", disabled.len())
            }
        }
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Computes the target state of an entity.
pub trait TargetPlanner: Send + Sync {
    /// Computes the target for `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if no target can be derived for this entity; the
    /// engine records it as a per-entity failure.
    fn target_for(&self, entity: &Entity) -> Result<TargetState>;
}

/// Configuration-driven target rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRule {
    /// Set one attribute to a fixed value.
    SetAttribute {
        /// Attribute name.
        name: String,
        /// Desired value.
        value: String,
    },
    /// Move every entity into one container.
    MoveTo {
        /// Destination container.
        container: String,
    },
    /// Disable plans in a SKU, keeping whatever is already disabled.
    DisablePlans {
        /// License SKU.
        sku: String,
        /// All plan IDs belonging to the SKU.
        sku_plans: BTreeSet<String>,
        /// Plan IDs requested to be disabled.
        requested: BTreeSet<String>,
    },
}

impl TargetPlanner for TargetRule {
    fn target_for(&self, entity: &Entity) -> Result<TargetState> {
        match self {
            Self::SetAttribute { name, value } => Ok(TargetState::Attribute {
                name: name.clone(),
                value: value.clone(),
            }),
            Self::MoveTo { container } => Ok(TargetState::Relocate {
                container: container.clone(),
            }),
            Self::DisablePlans {
                sku,
                sku_plans,
                requested,
            } => {
                let (assigned, current) = entity.license(sku).ok_or_else(|| {
                    ReconcileError::apply_failed(
                        &entity.id,
                        format!("entity has no {sku} license assigned"),
                    )
                })?;

                Ok(TargetState::PlanSet {
                    sku: assigned.to_string(),
                    disabled: merge_disabled_plans(current, sku_plans, requested),
                })
            }
        }
    }
}
