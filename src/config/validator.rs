//! Configuration validation for run configurations.
//!
//! Checks a [`RunConfig`] before any directory call is made, so that
//! mistakes surface before anything is enumerated or mutated.

use crate::error::{ConfigError, ReconcileError, Result};
use crate::filter::glob_to_regex;
use std::collections::HashSet;
use tracing::debug;

use super::spec::{DirectoryBackend, RunConfig, TargetAction};

/// Validator for run configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a run configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &RunConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(ReconcileError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Runs every check and collects all errors and warnings.
    #[must_use]
    pub fn check(&self, config: &RunConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_directory(config, &mut result);
        Self::validate_scope(config, &mut result);
        Self::validate_filters(config, &mut result);
        Self::validate_target(config, &mut result);

        result
    }

    fn validate_directory(config: &RunConfig, result: &mut ValidationResult) {
        let directory = &config.directory;

        match directory.backend {
            DirectoryBackend::File => {
                if directory.path.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                    result.error(
                        "directory.path",
                        "Inventory path is required when using the file backend",
                    );
                }
            }
            DirectoryBackend::Http => match directory.url.as_deref() {
                None | Some("") => result.error(
                    "directory.url",
                    "Directory URL is required when using the http backend",
                ),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    result.error(
                        "directory.url",
                        format!("Directory URL '{url}' must start with http:// or https://"),
                    );
                }
                Some(url) if url.starts_with("http://") => {
                    result
                        .warnings
                        .push(format!("Directory URL '{url}' does not use TLS"));
                }
                Some(_) => {}
            },
        }
    }

    fn validate_scope(config: &RunConfig, result: &mut ValidationResult) {
        if config.scope.trim().is_empty() {
            result.error("scope", "Scope cannot be empty");
        }
    }

    fn validate_filters(config: &RunConfig, result: &mut ValidationResult) {
        let filters = &config.filters;

        for (i, group) in filters.include_groups.iter().enumerate() {
            if group.trim().is_empty() {
                result.error(
                    &format!("filters.include_groups[{i}]"),
                    "Group name cannot be empty",
                );
            }
        }

        for (i, group) in filters.exclude_groups.iter().enumerate() {
            if group.trim().is_empty() {
                result.error(
                    &format!("filters.exclude_groups[{i}]"),
                    "Group name cannot be empty",
                );
            }
        }

        let included: HashSet<String> = filters
            .include_groups
            .iter()
            .map(|g| g.to_lowercase())
            .collect();
        for group in &filters.exclude_groups {
            if included.contains(&group.to_lowercase()) {
                result.warnings.push(format!(
                    "Group '{group}' is both included and excluded; no entity can match"
                ));
            }
        }

        for (i, m) in filters.matches.iter().enumerate() {
            if m.attribute.trim().is_empty() {
                result.error(
                    &format!("filters.matches[{i}].attribute"),
                    "Attribute name cannot be empty",
                );
            }
            if let Err(e) = glob_to_regex(&m.pattern) {
                result.error(
                    &format!("filters.matches[{i}].pattern"),
                    format!("Invalid pattern '{}': {e}", m.pattern),
                );
            }
        }

        let mut seen = HashSet::new();
        for id in &filters.exclude {
            if !seen.insert(id.to_lowercase()) {
                result
                    .warnings
                    .push(format!("Entity '{id}' is excluded more than once"));
            }
        }

        if config.to_predicates().is_empty() {
            result.warnings.push(String::from(
                "No filters configured; every entity in scope will be reconciled",
            ));
        }
    }

    fn validate_target(config: &RunConfig, result: &mut ValidationResult) {
        let target = &config.target;
        let missing = |value: &Option<String>| value.as_deref().is_none_or(str::is_empty);

        match target.action {
            TargetAction::SetAttribute => {
                if missing(&target.attribute) {
                    result.error("target.attribute", "Attribute name is required for set_attribute");
                }
                if missing(&target.value) {
                    result.error("target.value", "Attribute value is required for set_attribute");
                }
            }
            TargetAction::Move => {
                if missing(&target.container) {
                    result.error("target.container", "Destination container is required for move");
                } else if target
                    .container
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(&config.scope))
                {
                    result.warnings.push(String::from(
                        "Destination container equals the scope; every entity already there will be skipped",
                    ));
                }
            }
            TargetAction::DisablePlans => {
                if target.plans.iter().all(|p| p.trim().is_empty()) {
                    result.error("target.plans", "At least one plan name is required for disable_plans");
                }
                if target.sku.is_none() {
                    result.warnings.push(format!(
                        "No target.sku set; using scope '{}' as the license SKU",
                        config.scope
                    ));
                }
            }
        }
    }
}
