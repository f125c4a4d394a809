//! CLI module for the reconcile tool.
//!
//! This module provides the command-line interface for planning and
//! applying bulk reconciliation runs.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, RunArgs};
pub use output::OutputFormatter;
