//! File-backed inventory directory.
//!
//! This backend reads a JSON inventory snapshot, answers queries from memory
//! and writes every successful mutation back to disk. It serves offline runs,
//! exported snapshots and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DirectoryError, ReconcileError, Result};
use crate::reconcile::TargetState;

use super::store::Directory;
use super::types::{Entity, ServicePlan};

/// Serialized inventory contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    /// Known containers (OUs, folders).
    #[serde(default)]
    pub containers: BTreeSet<String>,
    /// All entities.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Group name to member identifiers.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// License SKU to its service-plan catalog.
    #[serde(default)]
    pub skus: BTreeMap<String, Vec<ServicePlan>>,
}

impl Inventory {
    /// Returns the entities in a scope, or `None` if the scope is unknown.
    ///
    /// A scope names either a container (matched as a subtree) or a SKU
    /// (matched by license assignment).
    #[must_use]
    pub fn scope(&self, scope: &str) -> Option<Vec<Entity>> {
        if let Some(sku) = self.skus.keys().find(|k| k.eq_ignore_ascii_case(scope)) {
            return Some(
                self.entities
                    .iter()
                    .filter(|e| e.license(sku).is_some())
                    .cloned()
                    .collect(),
            );
        }

        let known = self
            .containers
            .iter()
            .any(|c| c.eq_ignore_ascii_case(scope) || ends_with_ignore_case(c, scope));
        if !known {
            return None;
        }

        Some(
            self.entities
                .iter()
                .filter(|e| e.is_within(scope))
                .cloned()
                .collect(),
        )
    }

    /// Finds an entity by identifier, case-insensitively.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id.eq_ignore_ascii_case(id))
    }

    /// Finds a group by name, case-insensitively.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Vec<String>> {
        self.groups
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, members)| members)
    }

    /// Applies a target state to the stored entity.
    ///
    /// # Errors
    ///
    /// Returns `ApplyFailed` if the entity is missing, the destination
    /// container does not exist, or the entity has no such license.
    pub fn apply(&mut self, id: &str, target: &TargetState) -> Result<()> {
        let container_known = match target {
            TargetState::Relocate { container } => self
                .containers
                .iter()
                .any(|c| c.eq_ignore_ascii_case(container)),
            _ => true,
        };

        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| ReconcileError::apply_failed(id, "entity not found in inventory"))?;

        match target {
            TargetState::Attribute { name, value } => {
                entity.attributes.insert(name.clone(), value.clone());
            }
            TargetState::Relocate { container } => {
                if !container_known {
                    return Err(ReconcileError::apply_failed(
                        id,
                        format!("destination container '{container}' does not exist"),
                    ));
                }
                entity.container = Some(container.clone());
            }
            TargetState::PlanSet { sku, disabled } => {
                let Some(current) = entity
                    .licenses
                    .iter_mut()
                    .find(|(name, _)| name.eq_ignore_ascii_case(sku))
                    .map(|(_, disabled)| disabled)
                else {
                    return Err(ReconcileError::apply_failed(
                        id,
                        format!("no {sku} license assigned"),
                    ));
                };
                current.clone_from(disabled);
            }
        }

        Ok(())
    }
}

fn ends_with_ignore_case(container: &str, scope: &str) -> bool {
    container
        .to_ascii_lowercase()
        .ends_with(&format!(",{}", scope.to_ascii_lowercase()))
}

/// Directory backed by a JSON inventory file.
#[derive(Debug)]
pub struct FileDirectory {
    /// Path to the inventory file.
    path: PathBuf,
    /// In-memory copy of the inventory.
    inventory: Mutex<Inventory>,
}

impl FileDirectory {
    /// Opens an inventory file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        info!("Loading inventory from: {}", path.display());

        let content = fs::read_to_string(&path).await.map_err(|e| {
            DirectoryError::inventory(format!(
                "Failed to read inventory file {}: {e}",
                path.display()
            ))
        })?;

        let inventory: Inventory = serde_json::from_str(&content).map_err(|e| {
            DirectoryError::inventory(format!("Failed to parse inventory file: {e}"))
        })?;

        debug!(
            "Inventory has {} entities, {} groups, {} SKUs",
            inventory.entities.len(),
            inventory.groups.len(),
            inventory.skus.len()
        );

        Ok(Self {
            path,
            inventory: Mutex::new(inventory),
        })
    }

    /// Returns the inventory file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current inventory.
    pub async fn snapshot(&self) -> Inventory {
        self.inventory.lock().await.clone()
    }

    /// Writes the inventory to disk.
    async fn persist(&self, inventory: &Inventory) -> Result<()> {
        let content = serde_json::to_string_pretty(inventory).map_err(|e| {
            DirectoryError::inventory(format!("Failed to serialize inventory: {e}"))
        })?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            DirectoryError::inventory(format!("Failed to create temp inventory file: {e}"))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            DirectoryError::inventory(format!("Failed to write inventory file: {e}"))
        })?;

        file.sync_all().await.map_err(|e| {
            DirectoryError::inventory(format!("Failed to sync inventory file: {e}"))
        })?;

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            DirectoryError::inventory(format!("Failed to rename inventory file: {e}"))
        })?;

        debug!("Inventory saved to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl Directory for FileDirectory {
    async fn list_entities(&self, scope: &str) -> Result<Option<Vec<Entity>>> {
        Ok(self.inventory.lock().await.scope(scope))
    }

    async fn lookup(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.inventory.lock().await.find(id).cloned())
    }

    async fn group_members(&self, group: &str) -> Result<Option<Vec<String>>> {
        Ok(self.inventory.lock().await.group(group).cloned())
    }

    async fn service_plans(&self, sku: &str) -> Result<Option<Vec<ServicePlan>>> {
        let inventory = self.inventory.lock().await;
        Ok(inventory
            .skus
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(sku))
            .map(|(_, plans)| plans.clone()))
    }

    async fn apply_target(&self, entity: &Entity, target: &TargetState) -> Result<()> {
        let mut inventory = self.inventory.lock().await;

        let mut updated = inventory.clone();
        updated.apply(&entity.id, target)?;

        self.persist(&updated)
            .await
            .map_err(|e| ReconcileError::apply_failed(&entity.id, e.to_string()))?;

        *inventory = updated;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
