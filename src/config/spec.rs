//! Run configuration types.
//!
//! This module defines the structs that map to `reconcile.yaml`. A run
//! configuration fully describes one reconciliation: where entities come
//! from, which of them are in play, and what state they should end up in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::directory::Directory;
use crate::error::{ConfigError, ReconcileError, Result};
use crate::filter::PredicateSpec;
use crate::reconcile::{TargetRule, resolve_plan_names};

/// The root configuration structure for a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    /// Directory backend configuration.
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Scope to enumerate (container DN or license SKU).
    #[serde(default)]
    pub scope: String,
    /// Entity filters.
    #[serde(default)]
    pub filters: FilterConfig,
    /// Desired state.
    #[serde(default)]
    pub target: TargetConfig,
    /// Output options.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Directory backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: DirectoryBackend,
    /// Inventory file path (file backend).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Service base URL (http backend).
    #[serde(default)]
    pub url: Option<String>,
}

/// Directory backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    /// JSON inventory file.
    #[default]
    File,
    /// REST directory service.
    Http,
}

/// Filter configuration. All configured filters must pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterConfig {
    /// Keep only enabled entities.
    #[serde(default)]
    pub enabled_only: bool,
    /// Groups an entity must belong to.
    #[serde(default)]
    pub include_groups: Vec<String>,
    /// Groups an entity must not belong to.
    #[serde(default)]
    pub exclude_groups: Vec<String>,
    /// Entity identifiers to leave untouched.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Attribute glob matches.
    #[serde(default)]
    pub matches: Vec<AttributeMatch>,
}

/// A glob match against one attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeMatch {
    /// Attribute name.
    pub attribute: String,
    /// Shell-style glob (`*`, `?`).
    pub pattern: String,
}

impl FromStr for AttributeMatch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (attribute, pattern) = s
            .split_once('=')
            .ok_or_else(|| format!("expected attribute=glob, got '{s}'"))?;

        let attribute = attribute.trim();
        if attribute.is_empty() {
            return Err(format!("missing attribute name in '{s}'"));
        }

        Ok(Self {
            attribute: attribute.to_string(),
            pattern: pattern.trim().to_string(),
        })
    }
}

impl fmt::Display for AttributeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, self.pattern)
    }
}

/// Kinds of change a run can make.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    /// Set an attribute to a fixed value.
    #[default]
    #[value(name = "set")]
    SetAttribute,
    /// Move entities into a container.
    Move,
    /// Disable service plans in a license SKU.
    DisablePlans,
}

impl fmt::Display for TargetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetAttribute => write!(f, "set_attribute"),
            Self::Move => write!(f, "move"),
            Self::DisablePlans => write!(f, "disable_plans"),
        }
    }
}

/// Desired state configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Change to make.
    #[serde(default)]
    pub action: TargetAction,
    /// Attribute name (`set_attribute`).
    #[serde(default)]
    pub attribute: Option<String>,
    /// Attribute value (`set_attribute`).
    #[serde(default)]
    pub value: Option<String>,
    /// Destination container (`move`).
    #[serde(default)]
    pub container: Option<String>,
    /// License SKU (`disable_plans`); defaults to the run scope.
    #[serde(default)]
    pub sku: Option<String>,
    /// Service-plan names to disable (`disable_plans`).
    #[serde(default)]
    pub plans: Vec<String>,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    /// Write per-entity outcomes to this CSV file after `apply`.
    #[serde(default)]
    pub csv: Option<PathBuf>,
}

impl RunConfig {
    /// Builds the predicate list from the filter section.
    #[must_use]
    pub fn to_predicates(&self) -> Vec<PredicateSpec> {
        let filters = &self.filters;
        let mut specs = Vec::new();

        if filters.enabled_only {
            specs.push(PredicateSpec::Enabled(true));
        }

        specs.extend(
            filters
                .include_groups
                .iter()
                .map(|g| PredicateSpec::MemberOf(g.clone())),
        );
        specs.extend(
            filters
                .exclude_groups
                .iter()
                .map(|g| PredicateSpec::NotMemberOf(g.clone())),
        );
        specs.extend(filters.matches.iter().map(|m| PredicateSpec::AttributeGlob {
            attribute: m.attribute.clone(),
            pattern: m.pattern.clone(),
        }));

        if !filters.exclude.is_empty() {
            specs.push(PredicateSpec::Exclude(filters.exclude.clone()));
        }

        specs
    }

    /// Returns the inventory path, resolved against `base` when relative.
    #[must_use]
    pub fn inventory_path(&self, base: &Path) -> Option<PathBuf> {
        self.directory.path.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                base.join(path)
            }
        })
    }

    /// Returns the license SKU for `disable_plans`.
    #[must_use]
    pub fn sku(&self) -> &str {
        self.target.sku.as_deref().unwrap_or(&self.scope)
    }

    /// Builds the target rule, resolving plan names against the directory.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required target field is missing,
    /// or `FilterResolution` if the SKU has no plan catalog.
    pub async fn target_rule(&self, directory: &dyn Directory) -> Result<TargetRule> {
        let target = &self.target;

        match target.action {
            TargetAction::SetAttribute => {
                let name = required(target.attribute.as_ref(), "target.attribute")?;
                let value = required(target.value.as_ref(), "target.value")?;
                Ok(TargetRule::SetAttribute {
                    name: name.clone(),
                    value: value.clone(),
                })
            }
            TargetAction::Move => {
                let container = required(target.container.as_ref(), "target.container")?;
                Ok(TargetRule::MoveTo {
                    container: container.clone(),
                })
            }
            TargetAction::DisablePlans => {
                let sku = self.sku();
                let catalog = directory
                    .service_plans(sku)
                    .await
                    .map_err(|e| ReconcileError::filter_resolution(sku, e.to_string()))?
                    .ok_or_else(|| {
                        ReconcileError::filter_resolution(sku, "license SKU does not exist")
                    })?;

                debug!("SKU {sku} has {} service plans", catalog.len());
                let resolution = resolve_plan_names(sku, &catalog, &target.plans);
                let sku_plans: BTreeSet<String> = catalog.into_iter().map(|p| p.id).collect();

                Ok(TargetRule::DisablePlans {
                    sku: sku.to_string(),
                    sku_plans,
                    requested: resolution.ids,
                })
            }
        }
    }
}

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a String> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ReconcileError::Config(ConfigError::validation(
            format!("{field} is required for this action"),
            field,
        ))
    })
}
