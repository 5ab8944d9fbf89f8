//! Migration Sequencer - ordering, linking and range selection
//!
//! Turns the unordered contents of a [`Registry`] into the sequence of
//! migrations that moves a database from one version to another.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

use super::definitions::{Migration, NO_VERSION};
use super::registry::Registry;
use crate::error::{MigrateError, MigrateResult};

/// An ordered, linked sequence of migrations
#[derive(Debug, Clone, Default)]
pub struct Migrations(Vec<Migration>);

impl Migrations {
    /// Collect the migrations between `current` and `target`
    ///
    /// Upward ranges are `current < v <= target` in ascending order, downward
    /// ranges are `target < v <= current` in descending order. Equal versions
    /// produce an empty sequence.
    pub fn collect(registry: &Registry, current: i64, target: i64) -> MigrateResult<Self> {
        let selected: Vec<Migration> = registry
            .all()
            .filter(|m| version_filter(m.version, current, target))
            .cloned()
            .collect();

        let descending = target < current;
        let migrations = sort_and_connect(selected, descending)?;
        tracing::debug!(current, target, count = migrations.len(), "collected migrations");
        Ok(migrations)
    }

    /// Migration with exactly this version
    pub fn current(&self, version: i64) -> MigrateResult<&Migration> {
        self.0
            .iter()
            .find(|m| m.version == version)
            .ok_or(MigrateError::NoCurrentVersion)
    }

    /// Lowest migration above `version`
    pub fn next(&self, version: i64) -> MigrateResult<&Migration> {
        self.0
            .iter()
            .filter(|m| m.version > version)
            .min_by_key(|m| m.version)
            .ok_or(MigrateError::NoNextVersion)
    }

    /// Highest migration below `version`
    pub fn previous(&self, version: i64) -> MigrateResult<&Migration> {
        self.0
            .iter()
            .filter(|m| m.version < version)
            .max_by_key(|m| m.version)
            .ok_or(MigrateError::NoNextVersion)
    }

    /// Final migration of the sequence
    pub fn last(&self) -> MigrateResult<&Migration> {
        self.0.last().ok_or(MigrateError::NoNextVersion)
    }

    pub fn into_inner(self) -> Vec<Migration> {
        self.0
    }
}

impl Deref for Migrations {
    type Target = [Migration];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Migrations {
    type Item = Migration;
    type IntoIter = std::vec::IntoIter<Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Migrations {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for migration in &self.0 {
            writeln!(f, "{}", migration)?;
        }
        Ok(())
    }
}

/// Whether `version` lies in the range travelled from `current` to `target`
pub fn version_filter(version: i64, current: i64, target: i64) -> bool {
    match target.cmp(&current) {
        Ordering::Greater => version > current && version <= target,
        Ordering::Less => version <= current && version > target,
        Ordering::Equal => false,
    }
}

/// Sort by version and link each migration to its neighbours
pub fn sort_and_connect(mut migrations: Vec<Migration>, descending: bool) -> MigrateResult<Migrations> {
    migrations.sort_by_key(|m| m.version);

    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrateError::DuplicateVersion {
            version: pair[1].version,
            name: pair[1].name.clone(),
            existing: pair[0].name.clone(),
        });
    }

    if descending {
        migrations.reverse();
    }

    let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
    for (i, migration) in migrations.iter_mut().enumerate() {
        migration.previous = if i > 0 { versions[i - 1] } else { NO_VERSION };
        migration.next = versions.get(i + 1).copied().unwrap_or(NO_VERSION);
    }

    Ok(Migrations(migrations))
}
