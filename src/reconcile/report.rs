//! Run report aggregating per-entity outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

use crate::directory::Entity;
use crate::error::Result;

/// Column names of the CSV outcome export.
pub const CSV_HEADERS: [&str; 4] = ["entity", "name", "outcome", "detail"];

/// Result of reconciling one entity.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// The target state was applied.
    Applied,
    /// Nothing was done.
    Skipped(String),
    /// Computing or applying the target failed.
    Failed(String),
}

/// Outcome recorded for a single entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityOutcome {
    /// Entity identifier.
    pub entity_id: String,
    /// Entity display name.
    pub name: String,
    /// What happened.
    pub outcome: Outcome,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Counts of outcomes in a run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Entities that were processed.
    pub attempted: usize,
    /// Entities that were changed.
    pub applied: usize,
    /// Entities left untouched.
    pub skipped: usize,
    /// Entities whose reconciliation failed.
    pub failed: usize,
}

/// Append-only record of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, once it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// Recorded outcomes, in processing order.
    outcomes: Vec<EntityOutcome>,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    /// Records the outcome for an entity.
    pub fn record(&mut self, entity: &Entity, outcome: Outcome) {
        self.outcomes.push(EntityOutcome {
            entity_id: entity.id.clone(),
            name: entity.display_name().to_string(),
            outcome,
            recorded_at: Utc::now(),
        });
    }

    /// Marks the run as finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns the recorded outcomes.
    #[must_use]
    pub fn outcomes(&self) -> &[EntityOutcome] {
        &self.outcomes
    }

    /// Returns the outcome counts.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.outcomes
            .iter()
            .fold(RunSummary::default(), |mut summary, entry| {
                summary.attempted += 1;
                match entry.outcome {
                    Outcome::Applied => summary.applied += 1,
                    Outcome::Skipped(_) => summary.skipped += 1,
                    Outcome::Failed(_) => summary.failed += 1,
                }
                summary
            })
    }

    /// Returns the outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed(_)))
    }

    /// Returns true if no entity failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.summary().failed == 0
    }

    /// Process exit code for this run: 0 if nothing failed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }

    /// Writes the per-entity outcomes as CSV, header first.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be written to `writer`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(CSV_HEADERS)?;

        for entry in &self.outcomes {
            let detail = match &entry.outcome {
                Outcome::Applied => "",
                Outcome::Skipped(detail) | Outcome::Failed(detail) => detail.as_str(),
            };
            wtr.write_record([
                entry.entity_id.as_str(),
                entry.name.as_str(),
                entry.outcome.label(),
                detail,
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl Outcome {
    /// Short label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} attempted: {} applied, {} skipped, {} failed",
            self.attempted, self.applied, self.skipped, self.failed
        )
    }
}
