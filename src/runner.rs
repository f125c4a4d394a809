//! Run orchestration for the `plan` and `apply` commands.
//!
//! Every check that can abort a run happens in [`RunPlan::prepare`], before
//! any entity is touched. Once [`RunPlan::apply`] starts, the run always
//! completes with a [`RunReport`].

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{ConfigParser, DirectoryBackend, RunConfig};
use crate::directory::{Directory, Entity, EntitySource, FileDirectory, HttpDirectory};
use crate::error::{ConfigError, ReconcileError, Result};
use crate::filter::PredicateFilter;
use crate::reconcile::{PlannedChange, ReconciliationEngine, RunReport, TargetRule};

/// Opens the directory backend named by the configuration.
///
/// Relative inventory paths are resolved against `base`.
///
/// # Errors
///
/// Returns a validation error if the backend is missing its path or URL,
/// or the backend's error if it cannot be opened.
pub async fn open_directory(config: &RunConfig, base: &Path) -> Result<Box<dyn Directory>> {
    let directory: Box<dyn Directory> = match config.directory.backend {
        DirectoryBackend::File => {
            let path = config.inventory_path(base).ok_or_else(|| {
                ReconcileError::Config(ConfigError::validation(
                    "Inventory path is required when using the file backend",
                    "directory.path",
                ))
            })?;
            Box::new(FileDirectory::open(path).await?)
        }
        DirectoryBackend::Http => {
            let url = config.directory.url.as_deref().ok_or_else(|| {
                ReconcileError::Config(ConfigError::validation(
                    "Directory URL is required when using the http backend",
                    "directory.url",
                ))
            })?;
            Box::new(HttpDirectory::new(url, ConfigParser::directory_token())?)
        }
    };

    debug!("Using {} directory backend", directory.backend_type());
    Ok(directory)
}

/// A run whose entities and target rule have been resolved.
#[derive(Debug)]
pub struct RunPlan {
    /// Scope the entities were listed from.
    scope: String,
    /// Entities surviving the filters, in listing order.
    entities: Vec<Entity>,
    /// Rule computing each entity's target state.
    rule: TargetRule,
    /// Engine applying the rule.
    engine: ReconciliationEngine,
}

impl RunPlan {
    /// Enumerates the scope, filters it and resolves the target rule.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` for an unknown or unreachable scope,
    /// `FilterResolution` for an unknown group, exclusion or SKU, and a
    /// configuration error for an incomplete target. Nothing is mutated.
    pub async fn prepare(
        config: &RunConfig,
        directory: &dyn Directory,
        force: bool,
    ) -> Result<Self> {
        let entities = EntitySource::new(directory).list(&config.scope).await?;

        let filter = PredicateFilter::resolve(directory, &config.to_predicates()).await?;
        let entities = filter.apply(entities);

        let rule = config.target_rule(directory).await?;
        info!("{} entities selected in scope '{}'", entities.len(), config.scope);

        Ok(Self {
            scope: config.scope.clone(),
            entities,
            rule,
            engine: ReconciliationEngine::new().with_force(force),
        })
    }

    /// Returns the scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the selected entities.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Computes the change for every selected entity without applying it.
    #[must_use]
    pub fn changes(&self) -> Vec<PlannedChange> {
        self.engine.plan(&self.entities, &self.rule)
    }

    /// Counts the entities an apply would mutate.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.changes().iter().filter(|c| c.is_actionable()).count()
    }

    /// Reconciles every selected entity.
    ///
    /// Entities whose target cannot be computed are reported as failed, so
    /// this runs even when nothing is pending.
    pub async fn apply(&self, directory: &dyn Directory) -> RunReport {
        self.engine.run(&self.entities, &self.rule, directory).await
    }
}

/// Writes the report's outcomes to a CSV file.
///
/// A write failure is logged and reported as `false`; the run itself has
/// already completed and keeps its exit code.
pub fn export_outcomes(report: &RunReport, path: &Path) -> bool {
    let written = File::create(path)
        .map_err(ReconcileError::from)
        .and_then(|file| report.write_csv(BufWriter::new(file)));

    match written {
        Ok(()) => {
            info!("Wrote outcomes to {}", path.display());
            true
        }
        Err(e) => {
            warn!("Could not write outcomes to {}: {e}", path.display());
            false
        }
    }
}
