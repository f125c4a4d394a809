//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::filter::GroupComparison;
use crate::reconcile::{Outcome, PlannedChange, RunReport, RunSummary};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Planned change row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Target")]
    target: String,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the changes a run would make.
    #[must_use]
    pub fn format_plan(&self, scope: &str, changes: &[PlannedChange]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&PlanJson {
                scope,
                entities: changes.len(),
                actionable: changes.iter().filter(|c| c.is_actionable()).count(),
                changes,
            })
            .unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(scope, changes),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(scope: &str, changes: &[PlannedChange]) -> String {
        let mut output = format!("\nPlan for scope {}\n\n", scope.bold());

        if changes.is_empty() {
            output.push_str("   No entities matched.\n");
            return output;
        }

        let rows: Vec<PlanRow> = changes
            .iter()
            .enumerate()
            .map(|(i, c)| PlanRow {
                index: i + 1,
                entity: Self::truncate(&c.name, 40),
                action: Self::format_change(c),
                target: c.error.as_deref().map_or_else(
                    || c.target.as_ref().map(ToString::to_string).unwrap_or_default(),
                    |e| Self::truncate(e, 50),
                ),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let actionable = changes.iter().filter(|c| c.is_actionable()).count();
        let in_sync = changes.iter().filter(|c| c.in_sync).count();
        let errors = changes.iter().filter(|c| c.error.is_some()).count();
        let _ = write!(
            output,
            "\nPlan: {} to change, {} already in target state, {} cannot be planned\n",
            actionable.to_string().yellow(),
            in_sync.to_string().green(),
            errors.to_string().red()
        );

        output
    }

    /// Formats a finished run report.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ReportJson::from(report))
                .unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &RunReport) -> String {
        let summary = report.summary();
        let status = if report.is_success() {
            format!("{} Reconciliation complete", "✓".green())
        } else {
            format!("{} Reconciliation finished with failures", "✗".red())
        };

        let mut output = format!("{status}\n");
        let _ = writeln!(output, "   Run: {}", report.run_id);

        let rows: Vec<OutcomeRow> = report
            .outcomes()
            .iter()
            .filter(|o| !matches!(o.outcome, Outcome::Skipped(_)))
            .map(|o| OutcomeRow {
                entity: Self::truncate(&o.name, 40),
                outcome: Self::format_outcome(&o.outcome),
                detail: match &o.outcome {
                    Outcome::Applied => String::new(),
                    Outcome::Skipped(detail) | Outcome::Failed(detail) => {
                        Self::truncate(detail, 60)
                    }
                },
            })
            .collect();

        if !rows.is_empty() {
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        output.push('\n');
        output.push_str(&Self::format_summary(summary));
        output.push('\n');

        output
    }

    /// Formats summary counters with color.
    fn format_summary(summary: RunSummary) -> String {
        format!(
            "Attempted: {}, applied: {}, skipped: {}, failed: {}",
            summary.attempted,
            summary.applied.to_string().green(),
            summary.skipped.to_string().dimmed(),
            summary.failed.to_string().red()
        )
    }

    /// Formats a group comparison.
    #[must_use]
    pub fn format_comparison(&self, comparison: &GroupComparison) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(comparison).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                let sections = [
                    (format!("Only in {}", comparison.left), &comparison.only_left),
                    (format!("Only in {}", comparison.right), &comparison.only_right),
                    (String::from("In both"), &comparison.both),
                ];

                for (title, members) in sections {
                    let _ = writeln!(output, "\n{} ({})", title.bold(), members.len());
                    for member in members {
                        let _ = writeln!(output, "   {member}");
                    }
                }

                if comparison.is_identical() {
                    let _ = writeln!(output, "\n{} Groups have identical members", "✓".green());
                }

                output
            }
        }
    }

    /// Formats validation warnings.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.errors.is_empty(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a planned change kind with color.
    fn format_change(change: &PlannedChange) -> String {
        if change.error.is_some() {
            "error".red().to_string()
        } else if change.in_sync {
            "in sync".dimmed().to_string()
        } else {
            "~change".yellow().to_string()
        }
    }

    /// Formats an outcome with color.
    fn format_outcome(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Applied => "applied".green().to_string(),
            Outcome::Skipped(_) => "skipped".dimmed().to_string(),
            Outcome::Failed(_) => "failed".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    scope: &'a str,
    entities: usize,
    actionable: usize,
    changes: &'a [PlannedChange],
}

#[derive(Serialize)]
struct ReportJson<'a> {
    run_id: String,
    started_at: String,
    finished_at: Option<String>,
    attempted: usize,
    applied: usize,
    skipped: usize,
    failed: usize,
    outcomes: &'a [crate::reconcile::EntityOutcome],
}

impl<'a> From<&'a RunReport> for ReportJson<'a> {
    fn from(report: &'a RunReport) -> Self {
        let summary = report.summary();
        Self {
            run_id: report.run_id.to_string(),
            started_at: report.started_at.to_rfc3339(),
            finished_at: report.finished_at.map(|t| t.to_rfc3339()),
            attempted: summary.attempted,
            applied: summary.applied,
            skipped: summary.skipped,
            failed: summary.failed,
            outcomes: report.outcomes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Entity;
    use crate::reconcile::TargetState;

    fn sample_report() -> RunReport {
        let mut report = RunReport::new();
        report.record(&Entity::new("alice"), Outcome::Applied);
        report.record(&Entity::new("bob"), Outcome::Skipped(String::from("already in target state")));
        report.record(&Entity::new("carol"), Outcome::Failed(String::from("access denied")));
        report.finish();
        report
    }

    #[test]
    fn test_report_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_report(&sample_report())).unwrap();

        assert_eq!(json["attempted"], 3);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["outcomes"].as_array().map(Vec::len), Some(3));
        assert!(json["finished_at"].is_string());
    }

    #[test]
    fn test_report_text_lists_changes_only() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_report(&sample_report());

        assert!(text.contains("finished with failures"));
        assert!(text.contains("alice"));
        assert!(text.contains("access denied"));
        assert!(!text.contains("bob"));
        assert!(text.contains("Attempted: 3, applied: 1, skipped: 1, failed: 1"));
    }

    #[test]
    fn test_plan_json() {
        let changes = vec![PlannedChange {
            entity_id: String::from("alice"),
            name: String::from("alice"),
            target: Some(TargetState::Relocate {
                container: String::from("OU=Leavers"),
            }),
            in_sync: false,
            error: None,
        }];
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_plan("OU=Staff", &changes)).unwrap();

        assert_eq!(json["actionable"], 1);
        assert_eq!(json["changes"][0]["target"]["kind"], "relocate");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(OutputFormatter::truncate("ééééééééé", 5), "éé...");
    }
}
