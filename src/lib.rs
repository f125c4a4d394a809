// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Bulk Reconcile
//!
//! Idempotent bulk reconciliation over a filtered set of directory entities.
//!
//! ## Overview
//!
//! A run enumerates the entities in a scope (an OU, an inventory folder or a
//! license SKU), narrows them with predicates, computes a target state for
//! each survivor and applies it only where the entity does not already match.
//! One entity failing never stops the others; every outcome lands in a
//! [`RunReport`].
//!
//! ## Architecture
//!
//! 1. **Enumerate**: [`EntitySource`] lists the scope through a [`Directory`]
//! 2. **Filter**: [`PredicateFilter`] resolves groups and exclusions once,
//!    then filters locally
//! 3. **Reconcile**: [`ReconciliationEngine`] computes targets, skips
//!    entities already in their target state and applies the rest
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`directory`]: Directory backends (inventory file, HTTP)
//! - [`filter`]: Predicates, group resolution and comparison
//! - [`reconcile`]: Target states, the engine and run reports
//! - [`runner`]: Preparing and applying a run
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! directory:
//!   backend: file
//!   path: inventory.json
//! scope: OU=Staff,DC=corp,DC=example
//! filters:
//!   enabled_only: true
//!   exclude_groups: [executives]
//! target:
//!   action: move
//!   container: OU=Leavers,DC=corp,DC=example
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod reconcile;
pub mod runner;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, RunConfig};
pub use directory::{Directory, Entity, EntitySource, FileDirectory, HttpDirectory};
pub use error::{ReconcileError, Result};
pub use filter::{PredicateFilter, PredicateSpec, compare_groups};
pub use reconcile::{Outcome, ReconciliationEngine, RunReport, TargetRule, TargetState};
pub use runner::{RunPlan, export_outcomes, open_directory};
