//! Entity predicates.
//!
//! A [`PredicateSpec`] names what to filter on. Resolving it against a
//! directory produces a [`Predicate`], which is a pure function over an
//! entity snapshot: group memberships and exclusions are already expanded to
//! local sets by then.

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::Arc;

use crate::directory::Entity;

/// An unresolved filter as written in configuration or on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateSpec {
    /// Keep entities whose enabled flag equals the value.
    Enabled(bool),
    /// Keep members of a group.
    MemberOf(String),
    /// Drop members of a group.
    NotMemberOf(String),
    /// Keep entities whose attribute matches a shell-style glob.
    AttributeGlob {
        /// Attribute to test.
        attribute: String,
        /// Glob pattern (`*` and `?` wildcards).
        pattern: String,
    },
    /// Drop an explicit list of entities.
    Exclude(Vec<String>),
}

/// A resolved predicate, evaluated locally.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Enabled flag equals the value.
    Enabled(bool),
    /// Entity is a member of the group.
    MemberOf {
        /// Group name.
        group: String,
        /// Lowercased member identifiers.
        members: Arc<HashSet<String>>,
    },
    /// Entity is not a member of the group.
    NotMemberOf {
        /// Group name.
        group: String,
        /// Lowercased member identifiers.
        members: Arc<HashSet<String>>,
    },
    /// Attribute matches a glob.
    AttributeGlob {
        /// Attribute to test.
        attribute: String,
        /// Original glob pattern.
        pattern: String,
        /// Compiled, anchored, case-insensitive matcher.
        matcher: Regex,
    },
    /// Entity is not in the exclusion list.
    Exclude(HashSet<String>),
}

impl Predicate {
    /// Returns true if the entity passes this predicate.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::Enabled(expected) => entity.enabled == *expected,
            Self::MemberOf { members, .. } => members.contains(&entity.id.to_lowercase()),
            Self::NotMemberOf { members, .. } => !members.contains(&entity.id.to_lowercase()),
            Self::AttributeGlob {
                attribute, matcher, ..
            } => entity
                .attribute(attribute)
                .is_some_and(|value| matcher.is_match(value)),
            Self::Exclude(excluded) => !excluded.contains(&entity.id.to_lowercase()),
        }
    }

    /// Builds a glob predicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the translated pattern cannot be compiled.
    pub fn glob(
        attribute: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let matcher = glob_to_regex(&pattern)?;
        Ok(Self::AttributeGlob {
            attribute: attribute.into(),
            pattern,
            matcher,
        })
    }
}

/// Translates a shell-style glob into an anchored, case-insensitive regex.
///
/// # Errors
///
/// Returns an error if the resulting expression is too large to compile.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr).case_insensitive(true).build()
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled(true) => write!(f, "enabled"),
            Self::Enabled(false) => write!(f, "disabled"),
            Self::MemberOf { group, members } => {
                write!(f, "member of {group} ({} members)", members.len())
            }
            Self::NotMemberOf { group, .. } => write!(f, "not member of {group}"),
            Self::AttributeGlob {
                attribute, pattern, ..
            } => write!(f, "{attribute} like '{pattern}'"),
            Self::Exclude(ids) => write!(f, "excluding {} entities", ids.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_matching() {
        let re = glob_to_regex("*Windows Server*").unwrap();
        assert!(re.is_match("Microsoft Windows Server 2019 (64-bit)"));
        assert!(re.is_match("microsoft windows server 2022"));
        assert!(!re.is_match("Ubuntu Linux (64-bit)"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let re = glob_to_regex("CentOS 7 (64-bit)").unwrap();
        assert!(re.is_match("CentOS 7 (64-bit)"));
        assert!(!re.is_match("CentOS 7 64-bit"));

        let single = glob_to_regex("vm-?").unwrap();
        assert!(single.is_match("vm-1"));
        assert!(!single.is_match("vm-10"));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let predicate = Predicate::glob("guest_os", "*").unwrap();
        assert!(!predicate.matches(&Entity::new("vm-1")));
        assert!(predicate.matches(&Entity::new("vm-2").with_attribute("guest_os", "")));
    }

    #[test]
    fn test_membership_is_case_insensitive() {
        let members: HashSet<String> = ["cn=alice,ou=staff".to_string()].into_iter().collect();
        let members = Arc::new(members);
        let member_of = Predicate::MemberOf {
            group: String::from("Admins"),
            members: Arc::clone(&members),
        };
        let not_member_of = Predicate::NotMemberOf {
            group: String::from("Admins"),
            members,
        };

        let alice = Entity::new("CN=Alice,OU=Staff");
        let bob = Entity::new("CN=Bob,OU=Staff");

        assert!(member_of.matches(&alice));
        assert!(!member_of.matches(&bob));
        assert!(!not_member_of.matches(&alice));
        assert!(not_member_of.matches(&bob));
    }

    #[test]
    fn test_enabled_and_exclude() {
        let enabled = Predicate::Enabled(true);
        assert!(enabled.matches(&Entity::new("a")));
        assert!(!enabled.matches(&Entity::new("b").with_enabled(false)));

        let exclude = Predicate::Exclude(["svc-backup".to_string()].into_iter().collect());
        assert!(!exclude.matches(&Entity::new("SVC-Backup")));
        assert!(exclude.matches(&Entity::new("jdoe")));
    }
}
