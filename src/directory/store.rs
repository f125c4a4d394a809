//! Directory trait definition.
//!
//! This module defines the collaborator interface every backend implements:
//! enumerate a scope, look up one entity, expand a group, read a SKU catalog
//! and apply a mutation.

use async_trait::async_trait;

use crate::error::Result;
use crate::reconcile::TargetState;

use super::types::{Entity, ServicePlan};

/// Trait for directory and inventory backends.
///
/// Lookups return `Ok(None)` when the named object does not exist, so callers
/// can tell "missing" apart from "unreachable".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Lists the entities in a scope (container subtree or license SKU).
    async fn list_entities(&self, scope: &str) -> Result<Option<Vec<Entity>>>;

    /// Gets the current attributes of a single entity.
    async fn lookup(&self, id: &str) -> Result<Option<Entity>>;

    /// Gets the member identifiers of a group.
    async fn group_members(&self, group: &str) -> Result<Option<Vec<String>>>;

    /// Gets the service-plan catalog of a license SKU.
    async fn service_plans(&self, sku: &str) -> Result<Option<Vec<ServicePlan>>>;

    /// Applies a target state to an entity.
    async fn apply_target(&self, entity: &Entity, target: &TargetState) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
