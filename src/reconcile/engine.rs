//! Reconciliation engine.
//!
//! Entities are processed one at a time. Each entity gets its own target
//! computation, idempotence check and mutation; an error in any of these is
//! recorded against that entity only and the loop moves on.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::directory::{Directory, Entity};
use crate::error::Result;

use super::report::{Outcome, RunReport};
use super::target::{TargetPlanner, TargetState};

/// Reason recorded for entities already in their target state.
pub const ALREADY_RECONCILED: &str = "already in target state";

/// Capability to apply a target state to an entity.
#[async_trait]
pub trait Mutator: Send + Sync {
    /// Applies `target` to `entity`.
    async fn apply(&self, entity: &Entity, target: &TargetState) -> Result<()>;
}

#[async_trait]
impl<D: Directory + ?Sized> Mutator for D {
    async fn apply(&self, entity: &Entity, target: &TargetState) -> Result<()> {
        self.apply_target(entity, target).await
    }
}

/// Adapts a plain function into a [`Mutator`].
pub struct FnMutator<F>(pub F);

impl<F> FnMutator<F>
where
    F: Fn(&Entity, &TargetState) -> Result<()> + Send + Sync,
{
    /// Wraps `f`.
    #[must_use]
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Mutator for FnMutator<F>
where
    F: Fn(&Entity, &TargetState) -> Result<()> + Send + Sync,
{
    async fn apply(&self, entity: &Entity, target: &TargetState) -> Result<()> {
        (self.0)(entity, target)
    }
}

/// A change computed without applying it.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedChange {
    /// Entity identifier.
    pub entity_id: String,
    /// Entity display name.
    pub name: String,
    /// Computed target, if it could be derived.
    pub target: Option<TargetState>,
    /// Whether the entity already matches the target.
    pub in_sync: bool,
    /// Error computing the target, if any.
    pub error: Option<String>,
}

/// Engine applying target states to a filtered entity set.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    /// Re-apply even when the snapshot already matches.
    force: bool,
}

impl ReconciliationEngine {
    /// Creates a new engine.
    #[must_use]
    pub const fn new() -> Self {
        Self { force: false }
    }

    /// Re-applies targets to entities that already match them.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Reconciles every entity and returns the report.
    ///
    /// Never fails as a whole: per-entity errors become `Failed` outcomes.
    pub async fn run<P, M>(&self, entities: &[Entity], planner: &P, mutator: &M) -> RunReport
    where
        P: TargetPlanner + ?Sized,
        M: Mutator + ?Sized,
    {
        info!("Reconciling {} entities", entities.len());

        let mut report = RunReport::new();

        for entity in entities {
            let outcome = self.reconcile_one(entity, planner, mutator).await;
            report.record(entity, outcome);
        }

        report.finish();
        info!("Reconciliation finished: {}", report.summary());
        report
    }

    /// Computes targets for every entity without mutating anything.
    pub fn plan<P>(&self, entities: &[Entity], planner: &P) -> Vec<PlannedChange>
    where
        P: TargetPlanner + ?Sized,
    {
        entities
            .iter()
            .map(|entity| match planner.target_for(entity) {
                Ok(target) => PlannedChange {
                    entity_id: entity.id.clone(),
                    name: entity.display_name().to_string(),
                    in_sync: !self.force && target.is_satisfied_by(entity),
                    target: Some(target),
                    error: None,
                },
                Err(e) => PlannedChange {
                    entity_id: entity.id.clone(),
                    name: entity.display_name().to_string(),
                    target: None,
                    in_sync: false,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    /// Reconciles a single entity.
    async fn reconcile_one<P, M>(&self, entity: &Entity, planner: &P, mutator: &M) -> Outcome
    where
        P: TargetPlanner + ?Sized,
        M: Mutator + ?Sized,
    {
        let target = match planner.target_for(entity) {
            Ok(target) => target,
            Err(e) => {
                error!("Cannot compute target for {}: {e}", entity.id);
                return Outcome::Failed(e.to_string());
            }
        };

        if !self.force && target.is_satisfied_by(entity) {
            debug!("{} is already in target state", entity.id);
            return Outcome::Skipped(String::from(ALREADY_RECONCILED));
        }

        match mutator.apply(entity, &target).await {
            Ok(()) => {
                info!("Applied '{target}' to {}", entity.id);
                Outcome::Applied
            }
            Err(e) => {
                error!("Failed to apply '{target}' to {}: {e}", entity.id);
                Outcome::Failed(e.to_string())
            }
        }
    }
}

impl PlannedChange {
    /// Returns true if applying this change would mutate the entity.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        self.target.is_some() && !self.in_sync
    }
}
