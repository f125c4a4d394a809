//! Entity enumeration for a run.

use tracing::{debug, info};

use crate::error::{ReconcileError, Result};

use super::store::Directory;
use super::types::Entity;

/// Enumerates candidate entities from a directory.
pub struct EntitySource<'a> {
    /// Backing directory.
    directory: &'a dyn Directory,
}

impl<'a> EntitySource<'a> {
    /// Creates a new entity source.
    #[must_use]
    pub const fn new(directory: &'a dyn Directory) -> Self {
        Self { directory }
    }

    /// Lists the entities in `scope`.
    ///
    /// An empty scope is a valid result.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if the scope does not exist or the
    /// directory cannot be reached.
    pub async fn list(&self, scope: &str) -> Result<Vec<Entity>> {
        info!(
            "Listing entities in scope '{scope}' ({} backend)",
            self.directory.backend_type()
        );

        let listed = self
            .directory
            .list_entities(scope)
            .await
            .map_err(|e| ReconcileError::source_unavailable(scope, e.to_string()))?;

        let Some(entities) = listed else {
            return Err(ReconcileError::source_unavailable(
                scope,
                "scope does not exist",
            ));
        };

        debug!("Scope '{scope}' contains {} entities", entities.len());
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MockDirectory;
    use crate::error::DirectoryError;

    #[tokio::test]
    async fn test_list_returns_entities() {
        let mut directory = MockDirectory::new();
        directory.expect_backend_type().return_const("mock");
        directory
            .expect_list_entities()
            .withf(|scope| scope == "OU=Staff")
            .returning(|_| Ok(Some(vec![Entity::new("a"), Entity::new("b")])));

        let entities = EntitySource::new(&directory).list("OU=Staff").await.unwrap();
        assert_eq!(entities.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_scope_is_not_an_error() {
        let mut directory = MockDirectory::new();
        directory.expect_backend_type().return_const("mock");
        directory
            .expect_list_entities()
            .returning(|_| Ok(Some(vec![])));

        let entities = EntitySource::new(&directory).list("OU=Empty").await.unwrap();
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn test_missing_scope_is_source_unavailable() {
        let mut directory = MockDirectory::new();
        directory.expect_backend_type().return_const("mock");
        directory.expect_list_entities().returning(|_| Ok(None));

        let err = EntitySource::new(&directory).list("OU=Gone").await.unwrap_err();
        assert!(matches!(err, ReconcileError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_source_unavailable() {
        let mut directory = MockDirectory::new();
        directory.expect_backend_type().return_const("mock");
        directory
            .expect_list_entities()
            .returning(|_| Err(DirectoryError::network("connection refused").into()));

        let err = EntitySource::new(&directory).list("OU=Staff").await.unwrap_err();
        match err {
            ReconcileError::SourceUnavailable { scope, reason } => {
                assert_eq!(scope, "OU=Staff");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
