//! Predicate resolution and filtering.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::directory::{Directory, Entity};
use crate::error::{ReconcileError, Result};

use super::predicate::{Predicate, PredicateSpec};

/// Resolves group memberships, fetching each group at most once.
pub struct GroupResolver<'a> {
    /// Backing directory.
    directory: &'a dyn Directory,
    /// Groups already fetched, keyed by lowercased name.
    cache: HashMap<String, Arc<HashSet<String>>>,
}

impl<'a> GroupResolver<'a> {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new(directory: &'a dyn Directory) -> Self {
        Self {
            directory,
            cache: HashMap::new(),
        }
    }

    /// Returns the lowercased member identifiers of `group`.
    ///
    /// # Errors
    ///
    /// Returns `FilterResolution` if the group is unknown or cannot be read.
    pub async fn members(&mut self, group: &str) -> Result<Arc<HashSet<String>>> {
        let key = group.to_lowercase();
        if let Some(members) = self.cache.get(&key) {
            return Ok(Arc::clone(members));
        }

        debug!("Resolving members of group '{group}'");
        let members = self
            .directory
            .group_members(group)
            .await
            .map_err(|e| ReconcileError::filter_resolution(group, e.to_string()))?
            .ok_or_else(|| ReconcileError::filter_resolution(group, "group does not exist"))?;

        let members: Arc<HashSet<String>> =
            Arc::new(members.iter().map(|m| m.to_lowercase()).collect());
        self.cache.insert(key, Arc::clone(&members));
        Ok(members)
    }
}

/// AND-composition of resolved predicates.
#[derive(Debug, Clone, Default)]
pub struct PredicateFilter {
    /// Resolved predicates.
    predicates: Vec<Predicate>,
}

impl PredicateFilter {
    /// Creates a filter from already resolved predicates.
    #[must_use]
    pub const fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Resolves predicate specs against a directory.
    ///
    /// Every referenced group is fetched once, and every excluded id must
    /// exist in the directory.
    ///
    /// # Errors
    ///
    /// Returns `FilterResolution` for unknown groups, unknown exclusions or
    /// invalid glob patterns.
    pub async fn resolve(directory: &dyn Directory, specs: &[PredicateSpec]) -> Result<Self> {
        let mut groups = GroupResolver::new(directory);
        let mut predicates = Vec::with_capacity(specs.len());

        for spec in specs {
            let predicate = match spec {
                PredicateSpec::Enabled(expected) => Predicate::Enabled(*expected),
                PredicateSpec::MemberOf(group) => Predicate::MemberOf {
                    group: group.clone(),
                    members: groups.members(group).await?,
                },
                PredicateSpec::NotMemberOf(group) => Predicate::NotMemberOf {
                    group: group.clone(),
                    members: groups.members(group).await?,
                },
                PredicateSpec::AttributeGlob { attribute, pattern } => {
                    Predicate::glob(attribute, pattern)
                        .map_err(|e| ReconcileError::filter_resolution(pattern, e.to_string()))?
                }
                PredicateSpec::Exclude(ids) => {
                    Predicate::Exclude(Self::resolve_exclusions(directory, ids).await?)
                }
            };
            debug!("Resolved filter: {predicate}");
            predicates.push(predicate);
        }

        Ok(Self { predicates })
    }

    /// Confirms each excluded id exists and returns the lowercased set.
    async fn resolve_exclusions(directory: &dyn Directory, ids: &[String]) -> Result<HashSet<String>> {
        let mut excluded = HashSet::with_capacity(ids.len());

        for id in ids {
            let found = directory
                .lookup(id)
                .await
                .map_err(|e| ReconcileError::filter_resolution(id, e.to_string()))?;

            let Some(entity) = found else {
                return Err(ReconcileError::filter_resolution(
                    id,
                    "excluded entity does not exist",
                ));
            };

            excluded.insert(id.to_lowercase());
            excluded.insert(entity.id.to_lowercase());
        }

        Ok(excluded)
    }

    /// Returns the resolved predicates.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns true if the entity passes every predicate.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.predicates.iter().all(|p| p.matches(entity))
    }

    /// Keeps the entities passing every predicate, preserving order.
    #[must_use]
    pub fn apply(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let total = entities.len();
        let kept: Vec<Entity> = entities.into_iter().filter(|e| self.matches(e)).collect();
        info!("Filters kept {} of {total} entities", kept.len());
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MockDirectory;

    fn ids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.id.as_str()).collect()
    }

    fn staff() -> Vec<Entity> {
        vec![
            Entity::new("alice").with_attribute("os", "Windows 11"),
            Entity::new("bob").with_enabled(false),
            Entity::new("carol").with_attribute("os", "Windows 10"),
            Entity::new("dave").with_attribute("os", "Ubuntu"),
        ]
    }

    #[tokio::test]
    async fn test_group_resolved_once_per_run() {
        let mut directory = MockDirectory::new();
        directory
            .expect_group_members()
            .withf(|group| group.eq_ignore_ascii_case("it-staff"))
            .times(1)
            .returning(|_| Ok(Some(vec![String::from("Alice"), String::from("carol")])));

        let specs = vec![
            PredicateSpec::MemberOf(String::from("IT-Staff")),
            PredicateSpec::NotMemberOf(String::from("it-staff")),
        ];
        let filter = PredicateFilter::resolve(&directory, &specs).await.unwrap();

        assert_eq!(filter.predicates().len(), 2);
        assert!(filter.apply(staff()).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_group_fails_resolution() {
        let mut directory = MockDirectory::new();
        directory.expect_group_members().returning(|_| Ok(None));

        let specs = vec![PredicateSpec::MemberOf(String::from("ghosts"))];
        let err = PredicateFilter::resolve(&directory, &specs).await.unwrap_err();

        assert!(matches!(err, ReconcileError::FilterResolution { reference, .. } if reference == "ghosts"));
    }

    #[tokio::test]
    async fn test_unknown_exclusion_fails_resolution() {
        let mut directory = MockDirectory::new();
        directory
            .expect_lookup()
            .withf(|id| id == "alice")
            .returning(|id| Ok(Some(Entity::new(id))));
        directory
            .expect_lookup()
            .withf(|id| id == "nobody")
            .returning(|_| Ok(None));

        let specs = vec![PredicateSpec::Exclude(vec![
            String::from("alice"),
            String::from("nobody"),
        ])];
        let err = PredicateFilter::resolve(&directory, &specs).await.unwrap_err();

        assert!(matches!(err, ReconcileError::FilterResolution { reference, .. } if reference == "nobody"));
    }

    #[tokio::test]
    async fn test_combined_filters_preserve_order() {
        let mut directory = MockDirectory::new();
        directory
            .expect_lookup()
            .returning(|id| Ok(Some(Entity::new(id))));

        let specs = vec![
            PredicateSpec::Enabled(true),
            PredicateSpec::AttributeGlob {
                attribute: String::from("os"),
                pattern: String::from("windows*"),
            },
            PredicateSpec::Exclude(vec![String::from("ALICE")]),
        ];
        let filter = PredicateFilter::resolve(&directory, &specs).await.unwrap();

        assert_eq!(ids(&filter.apply(staff())), vec!["carol"]);
    }

    #[test]
    fn test_no_predicates_keeps_everything_in_order() {
        let filter = PredicateFilter::default();
        assert_eq!(ids(&filter.apply(staff())), vec!["alice", "bob", "carol", "dave"]);
    }

    #[test]
    fn test_output_is_ordered_subset() {
        let filters = [
            PredicateFilter::new(vec![Predicate::Enabled(true)]),
            PredicateFilter::new(vec![Predicate::Enabled(false)]),
            PredicateFilter::new(vec![Predicate::glob("os", "*").unwrap()]),
            PredicateFilter::new(vec![
                Predicate::Enabled(true),
                Predicate::glob("os", "*1*").unwrap(),
            ]),
        ];

        let input = staff();
        let input_ids = ids(&input);
        for filter in &filters {
            let output = filter.apply(input.clone());
            let positions: Vec<usize> = output
                .iter()
                .map(|e| input_ids.iter().position(|id| *id == e.id).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
