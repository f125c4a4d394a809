//! Group membership comparison.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use crate::directory::Directory;
use crate::error::Result;

use super::resolve::GroupResolver;

/// Membership difference between two groups.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupComparison {
    /// Left-hand group name.
    pub left: String,
    /// Right-hand group name.
    pub right: String,
    /// Members only in the left group.
    pub only_left: Vec<String>,
    /// Members only in the right group.
    pub only_right: Vec<String>,
    /// Members of both groups.
    pub both: Vec<String>,
}

impl GroupComparison {
    /// Returns true if both groups have the same members.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }
}

/// Compares the members of two groups.
///
/// Member identifiers are compared case-insensitively and reported
/// lowercased and sorted.
///
/// # Errors
///
/// Returns `FilterResolution` if either group cannot be resolved.
pub async fn compare_groups(
    directory: &dyn Directory,
    left: &str,
    right: &str,
) -> Result<GroupComparison> {
    info!("Comparing group '{left}' with '{right}'");

    let mut resolver = GroupResolver::new(directory);
    let left_members: BTreeSet<String> = resolver.members(left).await?.iter().cloned().collect();
    let right_members: BTreeSet<String> = resolver.members(right).await?.iter().cloned().collect();

    Ok(GroupComparison {
        left: left.to_string(),
        right: right.to_string(),
        only_left: left_members.difference(&right_members).cloned().collect(),
        only_right: right_members.difference(&left_members).cloned().collect(),
        both: left_members.intersection(&right_members).cloned().collect(),
    })
}

impl std::fmt::Display for GroupComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Only in {}: {}", self.left, self.only_left.len())?;
        writeln!(f, "Only in {}: {}", self.right, self.only_right.len())?;
        write!(f, "In both: {}", self.both.len())
    }
}
