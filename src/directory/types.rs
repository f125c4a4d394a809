//! Entity snapshot types shared by every directory backend.
//!
//! An [`Entity`] is a read-only copy of what the external system reported at
//! enumeration time. The engine never mutates it; changes flow through a
//! [`TargetState`](crate::reconcile::TargetState) handed to the backend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Snapshot of a directory or inventory object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    /// External identifier (distinguished name, VM id, user principal name).
    pub id: String,
    /// Display name, if the backend exposes one.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the account or object is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Containing OU or inventory folder.
    #[serde(default)]
    pub container: Option<String>,
    /// Free-form string attributes (OS name, policy values, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Disabled service-plan IDs per assigned license SKU.
    #[serde(default)]
    pub licenses: BTreeMap<String, BTreeSet<String>>,
}

/// A feature inside a license SKU that can be disabled individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServicePlan {
    /// Plan identifier.
    pub id: String,
    /// Plan name (e.g. `EXCHANGE_S_ENTERPRISE`).
    pub name: String,
}

const fn default_enabled() -> bool {
    true
}

impl Entity {
    /// Creates an enabled entity with no attributes.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            enabled: true,
            container: None,
            attributes: BTreeMap::new(),
            licenses: BTreeMap::new(),
        }
    }

    /// Sets the container.
    #[must_use]
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Sets a string attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Assigns a license SKU with the given disabled plans.
    #[must_use]
    pub fn with_license<I, S>(mut self, sku: impl Into<String>, disabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.licenses
            .insert(sku.into(), disabled.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the display name, falling back to the identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns the assigned license matching `sku`, ignoring case.
    ///
    /// Yields the SKU name as the entity stores it and its disabled plans.
    #[must_use]
    pub fn license(&self, sku: &str) -> Option<(&str, &BTreeSet<String>)> {
        self.licenses
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(sku))
            .map(|(name, disabled)| (name.as_str(), disabled))
    }

    /// Returns true if the entity sits in `scope` or anywhere below it.
    ///
    /// Containers are compared as distinguished names: case-insensitive,
    /// with a child matching when it ends in `,<scope>`.
    #[must_use]
    pub fn is_within(&self, scope: &str) -> bool {
        let Some(container) = self.container.as_deref() else {
            return false;
        };
        let container = container.to_ascii_lowercase();
        let scope = scope.to_ascii_lowercase();
        container == scope || container.ends_with(&format!(",{scope}"))
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
