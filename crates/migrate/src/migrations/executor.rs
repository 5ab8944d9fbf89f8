//! Migration Executor - applies one migration in one transaction
//!
//! The step and its ledger row are committed together; a failing step is
//! rolled back before the error is returned, so the ledger never records a
//! change that did not happen.

use sqlx::{Any, Transaction};
use tracing::{debug, info, warn};

use super::definitions::{Migration, MigrationDirection};
use super::store::VersionStore;
use crate::error::{MigrateError, MigrateResult};

/// Run `migration` in `direction` and record the outcome in the ledger
pub async fn apply(
    store: &VersionStore,
    migration: &Migration,
    direction: MigrationDirection,
) -> MigrateResult<()> {
    if !migration.registered {
        return Err(MigrateError::Unregistered {
            version: migration.version,
            name: migration.name.clone(),
        });
    }

    let mut transaction = store.pool().begin().await.map_err(|e| {
        MigrateError::ledger(format!("failed to start transaction for {}: {}", migration, e))
    })?;

    if let Some(step) = migration.step(direction) {
        debug!(migration = %migration, ?direction, "running migration step");
        if let Err(source) = step.run(&mut *transaction).await {
            rollback(transaction, migration).await;
            return Err(MigrateError::Execution {
                version: migration.version,
                name: migration.name.clone(),
                source,
            });
        }
    }

    if let Err(e) = store
        .record_application(&mut *transaction, migration.version, direction.is_applied())
        .await
    {
        rollback(transaction, migration).await;
        return Err(e);
    }

    transaction.commit().await.map_err(|e| {
        MigrateError::ledger(format!("failed to commit migration {}: {}", migration, e))
    })?;

    info!("OK    {}", migration);
    Ok(())
}

// A failed rollback must not mask the error that caused it.
async fn rollback(transaction: Transaction<'_, Any>, migration: &Migration) {
    if let Err(e) = transaction.rollback().await {
        warn!(migration = %migration, "rollback failed: {}", e);
    }
}
