//! Reconciliation of filtered entity sets.
//!
//! This module computes target states, applies them through an injected
//! [`Mutator`], and aggregates per-entity outcomes into a [`RunReport`].

mod engine;
mod license;
mod report;
mod target;

pub use engine::{ALREADY_RECONCILED, FnMutator, Mutator, PlannedChange, ReconciliationEngine};
pub use license::{PlanResolution, merge_disabled_plans, resolve_plan_names};
pub use report::{CSV_HEADERS, EntityOutcome, Outcome, RunReport, RunSummary};
pub use target::{TargetPlanner, TargetRule, TargetState};
