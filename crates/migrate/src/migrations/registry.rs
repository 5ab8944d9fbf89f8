//! Migration Registry - the set of migrations known to a runner
//!
//! Registries are plain values: build one, register migrations into it and
//! hand it to a [`MigrationRunner`](super::runner::MigrationRunner).

use std::collections::HashMap;
use std::sync::Arc;

use super::definitions::{Migration, MigrationStep};
use crate::error::{MigrateError, MigrateResult};

/// Collection of migrations keyed by version
#[derive(Debug, Clone, Default)]
pub struct Registry {
    migrations: HashMap<i64, Migration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration from its parts
    ///
    /// Fails with [`MigrateError::DuplicateVersion`] when the version is taken.
    pub fn register(
        &mut self,
        version: i64,
        name: impl Into<String>,
        up: Option<Arc<dyn MigrationStep>>,
        down: Option<Arc<dyn MigrationStep>>,
    ) -> MigrateResult<()> {
        self.add(Migration::new(version, name, up, down))
    }

    /// Register a prebuilt migration
    pub fn add(&mut self, migration: Migration) -> MigrateResult<()> {
        if let Some(existing) = self.migrations.get(&migration.version) {
            return Err(MigrateError::DuplicateVersion {
                version: migration.version,
                name: migration.name,
                existing: existing.name.clone(),
            });
        }

        tracing::debug!(version = migration.version, name = %migration.name, "registered migration");
        self.migrations.insert(migration.version, migration);
        Ok(())
    }

    /// Every registered migration, in no particular order
    pub fn all(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations.get(&version)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::definitions::sql;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry
            .register(1, "init", Some(sql("CREATE TABLE a (id INTEGER)")), None)
            .unwrap();
        registry.register(2, "add_users", None, None).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(2).unwrap().name, "add_users");
        assert!(registry.get(3).is_none());
        assert!(registry.all().all(|m| m.registered));
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let mut registry = Registry::new();
        registry.register(5, "first", None, None).unwrap();

        let err = registry.register(5, "second", None, None).unwrap_err();
        match err {
            MigrateError::DuplicateVersion {
                version,
                name,
                existing,
            } => {
                assert_eq!(version, 5);
                assert_eq!(name, "second");
                assert_eq!(existing, "first");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(5).unwrap().name, "first");
    }
}
