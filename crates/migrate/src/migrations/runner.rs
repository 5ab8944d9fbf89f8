//! Migration Runner - drives the database between versions
//!
//! The runner holds no state of its own beyond the registry: every command
//! starts by reading the current version from the ledger.

use sqlx::AnyPool;
use std::time::Instant;
use tracing::info;

use super::definitions::{
    MigrationDirection, MigrationRunResult, MigrationState, MigrationStatus, MAX_VERSION,
    MIN_VERSION,
};
use super::dialect::Dialect;
use super::executor;
use super::registry::Registry;
use super::sequencer::Migrations;
use super::store::VersionStore;
use crate::error::{MigrateError, MigrateResult};

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    registry: Registry,
    store: VersionStore,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(registry: Registry, pool: AnyPool, dialect: Dialect) -> Self {
        Self {
            registry,
            store: VersionStore::new(pool, dialect),
        }
    }

    /// Create a new migration runner from a database URL
    pub async fn from_url(registry: Registry, database_url: &str, dialect: Dialect) -> MigrateResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPool::connect(database_url).await.map_err(|e| {
            MigrateError::configuration(format!("Failed to connect to database: {}", e))
        })?;

        Ok(Self::new(registry, pool, dialect))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Current applied version
    pub async fn version(&self) -> MigrateResult<i64> {
        let current = self.store.ensure_version().await?;
        info!("version {}", current);
        Ok(current)
    }

    /// Apply every pending migration
    pub async fn up(&self) -> MigrateResult<MigrationRunResult> {
        let current = self.store.ensure_version().await?;
        let migrations = Migrations::collect(&self.registry, current, MAX_VERSION)?;
        self.apply_all(migrations, MigrationDirection::Up, current).await
    }

    /// Apply only the next pending migration
    pub async fn up_by_one(&self) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let current = self.store.ensure_version().await?;
        let migrations = Migrations::collect(&self.registry, current, MAX_VERSION)?;

        let next = migrations.first().ok_or(MigrateError::NoNextVersion)?;
        executor::apply(&self.store, next, MigrationDirection::Up).await?;

        Ok(MigrationRunResult {
            applied_migrations: vec![next.version],
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Apply pending migrations up to and including `version`
    pub async fn up_to(&self, version: i64) -> MigrateResult<MigrationRunResult> {
        let current = self.store.ensure_version().await?;
        if version <= current {
            info!("no migrations to run. current version: {}", current);
            return Ok(MigrationRunResult::default());
        }

        let migrations = Migrations::collect(&self.registry, current, version)?;
        self.apply_all(migrations, MigrationDirection::Up, current).await
    }

    /// Roll back the current migration
    pub async fn down(&self) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let current = self.store.ensure_version().await?;
        let migrations = Migrations::collect(&self.registry, current, MIN_VERSION)?;

        let migration = migrations
            .first()
            .filter(|m| m.version == current)
            .ok_or(MigrateError::NoCurrentVersion)?;
        executor::apply(&self.store, migration, MigrationDirection::Down).await?;

        Ok(MigrationRunResult {
            applied_migrations: vec![migration.version],
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Roll back applied migrations newer than `version`
    pub async fn down_to(&self, version: i64) -> MigrateResult<MigrationRunResult> {
        let current = self.store.ensure_version().await?;
        if version >= current {
            info!("no migrations to run. current version: {}", current);
            return Ok(MigrationRunResult::default());
        }

        let migrations = Migrations::collect(&self.registry, current, version)?;
        self.apply_all(migrations, MigrationDirection::Down, current).await
    }

    /// Roll back the current migration and apply it again
    pub async fn redo(&self) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let current = self.store.ensure_version().await?;
        let migrations = Migrations::collect(&self.registry, MIN_VERSION, MAX_VERSION)?;
        let migration = migrations.current(current)?;

        executor::apply(&self.store, migration, MigrationDirection::Down).await?;
        executor::apply(&self.store, migration, MigrationDirection::Up).await?;

        Ok(MigrationRunResult {
            applied_migrations: vec![migration.version, migration.version],
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Roll back every applied migration
    pub async fn reset(&self) -> MigrateResult<MigrationRunResult> {
        self.down_to(MIN_VERSION).await
    }

    /// Applied/pending state of every registered migration, ascending
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let migrations = Migrations::collect(&self.registry, MIN_VERSION, MAX_VERSION)?;

        // make sure the ledger exists on a pristine database
        self.store.ensure_version().await?;

        let mut statuses = Vec::with_capacity(migrations.len());
        for migration in &migrations {
            let state = match self.store.latest_entry(migration.version).await? {
                Some(entry) if entry.is_applied => MigrationState::Applied {
                    applied_at: entry.timestamp,
                },
                _ => MigrationState::Pending,
            };
            statuses.push(MigrationStatus {
                version: migration.version,
                name: migration.name.clone(),
                state,
            });
        }

        Ok(statuses)
    }

    async fn apply_all(
        &self,
        migrations: Migrations,
        direction: MigrationDirection,
        current: i64,
    ) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();

        if migrations.is_empty() {
            info!("no migrations to run. current version: {}", current);
            return Ok(MigrationRunResult::default());
        }

        let mut applied_migrations = Vec::with_capacity(migrations.len());
        for migration in &migrations {
            executor::apply(&self.store, migration, direction).await?;
            applied_migrations.push(migration.version);
        }

        Ok(MigrationRunResult {
            applied_migrations,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }
}
