//! Entity filtering.
//!
//! This module resolves inclusion and exclusion predicates against a
//! directory once per run and applies them locally to enumerated entities.

mod compare;
mod predicate;
mod resolve;

pub use compare::{GroupComparison, compare_groups};
pub use predicate::{Predicate, PredicateSpec, glob_to_regex};
pub use resolve::{GroupResolver, PredicateFilter};
