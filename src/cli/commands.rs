//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AttributeMatch, RunConfig, TargetAction};

/// Reconcile - idempotent bulk changes over a filtered entity set.
#[derive(Parser, Debug)]
#[command(name = "reconcile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "RECONCILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template `reconcile.yaml`.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the run configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show what a run would change without changing anything.
    Plan {
        /// Run overrides.
        #[command(flatten)]
        run: RunArgs,
    },

    /// Reconcile every matching entity.
    Apply {
        /// Run overrides.
        #[command(flatten)]
        run: RunArgs,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Write per-entity outcomes to a CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Compare the members of two groups.
    Compare {
        /// Left-hand group.
        left: String,

        /// Right-hand group.
        right: String,
    },
}

/// Command-line overrides for a run.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Scope to enumerate (container DN or license SKU).
    #[arg(long)]
    pub scope: Option<String>,

    /// Keep only members of this group (repeatable).
    #[arg(long = "include-group", value_name = "GROUP")]
    pub include_groups: Vec<String>,

    /// Drop members of this group (repeatable).
    #[arg(long = "exclude-group", value_name = "GROUP")]
    pub exclude_groups: Vec<String>,

    /// Leave this entity untouched (repeatable).
    #[arg(long, value_name = "ID")]
    pub exclude: Vec<String>,

    /// Keep only enabled entities.
    #[arg(long)]
    pub enabled_only: bool,

    /// Keep entities whose attribute matches a glob, as `attr=glob` (repeatable).
    #[arg(long = "match", value_name = "ATTR=GLOB")]
    pub matches: Vec<AttributeMatch>,

    /// Change to make.
    #[arg(long, value_enum)]
    pub action: Option<TargetAction>,

    /// Attribute name for `set`.
    #[arg(long)]
    pub attribute: Option<String>,

    /// Policy value, destination container, or comma-separated plan names.
    #[arg(long)]
    pub target: Option<String>,

    /// Re-apply even to entities already in the target state.
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    /// Applies these overrides to a loaded configuration.
    ///
    /// Scalars replace the configured value; list flags extend it.
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(scope) = &self.scope {
            config.scope.clone_from(scope);
        }

        let filters = &mut config.filters;
        filters.enabled_only |= self.enabled_only;
        filters.include_groups.extend(self.include_groups.iter().cloned());
        filters.exclude_groups.extend(self.exclude_groups.iter().cloned());
        filters.exclude.extend(self.exclude.iter().cloned());
        filters.matches.extend(self.matches.iter().cloned());

        let target = &mut config.target;
        if let Some(action) = self.action {
            target.action = action;
        }
        if let Some(attribute) = &self.attribute {
            target.attribute = Some(attribute.clone());
        }
        if let Some(value) = &self.target {
            match target.action {
                TargetAction::SetAttribute => target.value = Some(value.clone()),
                TargetAction::Move => target.container = Some(value.clone()),
                TargetAction::DisablePlans => {
                    target.plans = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect();
                }
            }
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "reconcile",
            "apply",
            "--scope",
            "OU=Staff,DC=corp",
            "--exclude-group",
            "executives",
            "--match",
            "os=Windows*",
            "--action",
            "move",
            "--target",
            "OU=Leavers,DC=corp",
            "--yes",
        ])
        .unwrap();

        let Commands::Apply { run, yes, csv } = cli.command else {
            panic!("expected apply");
        };
        assert!(yes);
        assert!(csv.is_none());
        assert_eq!(run.action, Some(TargetAction::Move));
        assert_eq!(run.matches[0].attribute, "os");
    }

    #[test]
    fn test_action_names() {
        for (name, action) in [
            ("set", TargetAction::SetAttribute),
            ("move", TargetAction::Move),
            ("disable-plans", TargetAction::DisablePlans),
        ] {
            let cli = Cli::try_parse_from(["reconcile", "plan", "--action", name]).unwrap();
            let Commands::Plan { run } = cli.command else {
                panic!("expected plan");
            };
            assert_eq!(run.action, Some(action));
        }
    }

    #[test]
    fn test_overrides_extend_config() {
        let mut config = RunConfig::default();
        config.filters.include_groups.push(String::from("staff"));
        config.target.value = Some(String::from("manual"));

        let args = RunArgs {
            scope: Some(String::from("ENTERPRISEPACK")),
            include_groups: vec![String::from("sales")],
            action: Some(TargetAction::DisablePlans),
            target: Some(String::from("SWAY, YAMMER_ENTERPRISE,")),
            ..RunArgs::default()
        };
        args.apply_to(&mut config);

        assert_eq!(config.scope, "ENTERPRISEPACK");
        assert_eq!(config.filters.include_groups, vec!["staff", "sales"]);
        assert_eq!(config.target.action, TargetAction::DisablePlans);
        assert_eq!(config.target.plans, vec!["SWAY", "YAMMER_ENTERPRISE"]);
        assert_eq!(config.target.value.as_deref(), Some("manual"));
    }

    #[test]
    fn test_target_sets_value_for_set_action() {
        let mut config = RunConfig::default();
        let args = RunArgs {
            attribute: Some(String::from("tools_upgrade_policy")),
            target: Some(String::from("upgradeAtPowerCycle")),
            ..RunArgs::default()
        };
        args.apply_to(&mut config);

        assert_eq!(config.target.attribute.as_deref(), Some("tools_upgrade_policy"));
        assert_eq!(config.target.value.as_deref(), Some("upgradeAtPowerCycle"));
    }
}
