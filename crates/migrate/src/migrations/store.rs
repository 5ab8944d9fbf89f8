//! Version Store - the append-only ledger of applied and rolled back versions
//!
//! The current database version is never stored directly; it is derived by
//! replaying the ledger from the newest row backwards.

use chrono::NaiveDateTime;
use sqlx::any::AnyRow;
use sqlx::{Any, AnyConnection, AnyPool, Row, Transaction};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::definitions::{LedgerEntry, MIN_VERSION};
use super::dialect::Dialect;
use crate::error::{MigrateError, MigrateResult};

/// Ledger persistence for one pool and one dialect
#[derive(Debug, Clone)]
pub struct VersionStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl VersionStore {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Current applied version, creating the ledger on first use
    ///
    /// A failing ledger query is taken to mean the table does not exist yet:
    /// the table is created, seeded with `(0, applied)` and 0 is returned.
    pub async fn ensure_version(&self) -> MigrateResult<i64> {
        let sql = self.dialect.version_query_sql();
        let rows = match sqlx::query(&sql).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("ledger query failed ({}), creating {}", e, self.dialect.table_name());
                self.create_version_table().await?;
                return Ok(MIN_VERSION);
            }
        };

        let mut history = Vec::with_capacity(rows.len());
        for row in &rows {
            history.push((decode_version(row, 0)?, decode_bool(row, 1)?));
        }

        derive_current_version(history)
    }

    /// Append a ledger row inside the caller's transaction
    ///
    /// Committing is left to the caller so the row lands atomically with the
    /// schema change it records.
    pub async fn record_application(
        &self,
        conn: &mut AnyConnection,
        version: i64,
        applied: bool,
    ) -> MigrateResult<()> {
        sqlx::query(&self.dialect.insert_version_sql())
            .bind(version)
            .bind(applied)
            .execute(&mut *conn)
            .await
            .map_err(|e| MigrateError::ledger(format!("failed to record version {}: {}", version, e)))?;
        Ok(())
    }

    /// Newest ledger entry for a version, `None` if it was never run
    pub async fn latest_entry(&self, version: i64) -> MigrateResult<Option<LedgerEntry>> {
        let row = sqlx::query(&self.dialect.migration_status_sql())
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::ledger(format!("failed to query status of version {}: {}", version, e)))?;

        match row {
            Some(row) => Ok(Some(LedgerEntry {
                version_id: version,
                timestamp: decode_timestamp(&row, 0),
                is_applied: decode_bool(&row, 1)?,
            })),
            None => Ok(None),
        }
    }

    /// Full ledger history, newest first
    pub async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(&self.dialect.history_query_sql())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::ledger(format!("failed to read ledger: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(LedgerEntry {
                    version_id: decode_version(row, 0)?,
                    timestamp: decode_timestamp(row, 1),
                    is_applied: decode_bool(row, 2)?,
                })
            })
            .collect()
    }

    async fn create_version_table(&self) -> MigrateResult<()> {
        let mut tx = self.pool.begin().await?;

        if let Err(e) = sqlx::query(&self.dialect.create_version_table_sql())
            .execute(&mut *tx)
            .await
        {
            rollback(tx).await;
            return Err(MigrateError::ledger(format!(
                "failed to create {}: {}",
                self.dialect.table_name(),
                e
            )));
        }

        if let Err(e) = self.record_application(&mut *tx, MIN_VERSION, true).await {
            rollback(tx).await;
            return Err(e);
        }

        tx.commit().await?;
        info!("created version table {}", self.dialect.table_name());
        Ok(())
    }
}

async fn rollback(tx: Transaction<'_, Any>) {
    if let Err(e) = tx.rollback().await {
        warn!("rollback of ledger creation failed: {}", e);
    }
}

/// Derive the current version from `(version, is_applied)` rows, newest first
///
/// A rollback row hides every older row of the same version. The first
/// applied row that is not hidden wins.
pub fn derive_current_version<I>(history: I) -> MigrateResult<i64>
where
    I: IntoIterator<Item = (i64, bool)>,
{
    let mut superseded = HashSet::new();

    for (version, is_applied) in history {
        if superseded.contains(&version) {
            continue;
        }
        if is_applied {
            return Ok(version);
        }
        superseded.insert(version);
    }

    Err(MigrateError::NoNextVersion)
}

// Versions are selected as text so 64-bit values survive the `Any` driver.
fn decode_version(row: &AnyRow, index: usize) -> MigrateResult<i64> {
    let raw: String = row
        .try_get(index)
        .map_err(|e| MigrateError::ledger(format!("error scanning ledger row: {}", e)))?;
    raw.trim()
        .parse()
        .map_err(|_| MigrateError::ledger(format!("invalid version in ledger: {:?}", raw)))
}

// Engines without a native boolean store `is_applied` as an integer.
fn decode_bool(row: &AnyRow, index: usize) -> MigrateResult<bool> {
    match row.try_get::<bool, _>(index) {
        Ok(value) => Ok(value),
        Err(_) => row
            .try_get::<i64, _>(index)
            .map(|value| value != 0)
            .map_err(|e| MigrateError::ledger(format!("error scanning ledger row: {}", e))),
    }
}

fn decode_timestamp(row: &AnyRow, index: usize) -> Option<NaiveDateTime> {
    let raw: Option<String> = row.try_get(index).ok().flatten();
    raw.as_deref().and_then(parse_timestamp)
}

/// Parse a timestamp rendered as text by one of the supported engines
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    let raw = raw.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_applied_row_wins() {
        assert_eq!(derive_current_version([(3, true), (2, true), (1, true)]).unwrap(), 3);
    }

    #[test]
    fn test_rolled_back_version_is_skipped() {
        // 5 applied at t1, 5 rolled back at t2, 3 applied at t0
        let history = [(5, false), (5, true), (3, true)];
        assert_eq!(derive_current_version(history).unwrap(), 3);
    }

    #[test]
    fn test_redo_leaves_version_applied() {
        let history = [(4, true), (4, false), (4, true), (0, true)];
        assert_eq!(derive_current_version(history).unwrap(), 4);
    }

    #[test]
    fn test_fully_rolled_back_history() {
        let history = [(0, false), (1, false), (1, true), (0, true)];
        assert!(matches!(
            derive_current_version(history),
            Err(MigrateError::NoNextVersion)
        ));
        assert!(matches!(
            derive_current_version(Vec::new()),
            Err(MigrateError::NoNextVersion)
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-01 12:30:00").is_some());
        assert!(parse_timestamp("2024-01-01 12:30:00.123456").is_some());
        assert!(parse_timestamp("2024-01-01T12:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
