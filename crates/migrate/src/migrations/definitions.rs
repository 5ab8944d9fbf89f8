//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the migration entity, the executable step abstraction, ledger
//! entries and the result types reported by the runner.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::AnyConnection;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;

/// Lowest version a database can be migrated down to
pub const MIN_VERSION: i64 = 0;

/// Highest version a database can be migrated up to
pub const MAX_VERSION: i64 = i64::MAX;

/// Link sentinel meaning "no neighbouring migration"
pub const NO_VERSION: i64 = -1;

/// Result returned by a migration step
pub type StepResult = Result<(), BoxError>;

/// Boxed future returned by closure-based steps
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A forward or backward unit of work executed inside the migration transaction
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Perform the change on the transaction-scoped connection
    async fn run(&self, conn: &mut AnyConnection) -> StepResult;
}

/// Step that executes a block of SQL, one statement at a time
#[derive(Debug, Clone)]
pub struct SqlStep {
    sql: String,
}

impl SqlStep {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl MigrationStep for SqlStep {
    async fn run(&self, conn: &mut AnyConnection) -> StepResult {
        for statement in split_sql_statements(&self.sql) {
            tracing::debug!(sql = %statement, "executing migration statement");
            sqlx::query(&statement).execute(&mut *conn).await?;
        }
        Ok(())
    }
}

/// Step backed by an async closure
pub struct FnStep<F> {
    func: F,
}

#[async_trait]
impl<F> MigrationStep for FnStep<F>
where
    F: for<'c> Fn(&'c mut AnyConnection) -> BoxFuture<'c, StepResult> + Send + Sync,
{
    async fn run(&self, conn: &mut AnyConnection) -> StepResult {
        (self.func)(conn).await
    }
}

/// Wrap SQL text as a migration step
pub fn sql(sql: impl Into<String>) -> Arc<dyn MigrationStep> {
    Arc::new(SqlStep::new(sql))
}

/// Wrap an async closure as a migration step
///
/// ```rust,ignore
/// let up = step(|conn| Box::pin(async move {
///     sqlx::query("CREATE TABLE users (id INTEGER)").execute(conn).await?;
///     Ok::<(), BoxError>(())
/// }));
/// ```
pub fn step<F>(func: F) -> Arc<dyn MigrationStep>
where
    F: for<'c> Fn(&'c mut AnyConnection) -> BoxFuture<'c, StepResult> + Send + Sync + 'static,
{
    Arc::new(FnStep { func })
}

/// Split SQL text into executable statements
///
/// Uses a generic SQL parser and falls back to a lexical splitter that
/// respects quoting and `BEGIN ... END` bodies when the text uses syntax the
/// parser does not understand (triggers, procedures, engine extensions).
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    if sql.trim().is_empty() {
        return Vec::new();
    }

    match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(parsed) => parsed.into_iter().map(|stmt| stmt.to_string()).collect(),
        Err(e) => {
            tracing::debug!("SQL parsing failed, splitting lexically: {}", e);
            super::statements::split_statements(sql)
        }
    }
}

/// Represents a database migration
#[derive(Clone)]
pub struct Migration {
    /// Unique, totally ordered key (typically a timestamp)
    pub version: i64,
    /// Human-readable name for the migration
    pub name: String,
    /// Next version in the sequenced order, or [`NO_VERSION`]
    pub next: i64,
    /// Previous version in the sequenced order, or [`NO_VERSION`]
    pub previous: i64,
    /// Whether executable steps were registered for this migration
    pub registered: bool,
    pub up: Option<Arc<dyn MigrationStep>>,
    pub down: Option<Arc<dyn MigrationStep>>,
}

impl Migration {
    /// Create a registered migration with the given steps
    pub fn new(
        version: i64,
        name: impl Into<String>,
        up: Option<Arc<dyn MigrationStep>>,
        down: Option<Arc<dyn MigrationStep>>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            next: NO_VERSION,
            previous: NO_VERSION,
            registered: true,
            up,
            down,
        }
    }

    /// Create a migration that is known only as data and cannot be executed
    pub fn unregistered(version: i64, name: impl Into<String>) -> Self {
        Self {
            registered: false,
            ..Self::new(version, name, None, None)
        }
    }

    /// Step for the given direction, if any
    pub fn step(&self, direction: MigrationDirection) -> Option<&Arc<dyn MigrationStep>> {
        match direction {
            MigrationDirection::Up => self.up.as_ref(),
            MigrationDirection::Down => self.down.as_ref(),
        }
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.version, self.name)
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("next", &self.next)
            .field("previous", &self.previous)
            .field("registered", &self.registered)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}

/// One row of the version ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub version_id: i64,
    /// When the row was written; informational only
    pub timestamp: Option<NaiveDateTime>,
    /// `true` for a successful forward run, `false` for a rollback
    pub is_applied: bool,
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationDirection {
    /// Apply the migration (run the up step)
    Up,
    /// Rollback the migration (run the down step)
    Down,
}

impl MigrationDirection {
    /// Value recorded in the ledger for this direction
    pub fn is_applied(self) -> bool {
        matches!(self, MigrationDirection::Up)
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MigrationState {
    Pending,
    Applied { applied_at: Option<NaiveDateTime> },
}

/// Status line for one registered migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    pub state: MigrationState,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self.state, MigrationState::Applied { .. })
    }
}

/// Result of running a sequence of migrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationRunResult {
    /// Versions that were executed, in execution order
    pub applied_migrations: Vec<i64>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_display() {
        let migration = Migration::new(20240101120000, "create_users", None, None);
        assert_eq!(migration.to_string(), "20240101120000_create_users");
        assert_eq!(migration.next, NO_VERSION);
        assert_eq!(migration.previous, NO_VERSION);
        assert!(migration.registered);
    }

    #[test]
    fn test_unregistered_migration() {
        let migration = Migration::unregistered(7, "orphan");
        assert!(!migration.registered);
        assert!(migration.step(MigrationDirection::Up).is_none());
    }

    #[test]
    fn test_step_selection() {
        let migration = Migration::new(1, "init", Some(sql("CREATE TABLE a (id INTEGER)")), None);
        assert!(migration.step(MigrationDirection::Up).is_some());
        assert!(migration.step(MigrationDirection::Down).is_none());
        assert!(MigrationDirection::Up.is_applied());
        assert!(!MigrationDirection::Down.is_applied());
    }

    #[test]
    fn test_split_sql_statements() {
        let statements = split_sql_statements(
            "CREATE TABLE users (id INTEGER, email TEXT);\nCREATE INDEX idx_email ON users (email);",
        );
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE users"));
        assert!(statements[1].starts_with("CREATE INDEX idx_email"));
        assert!(split_sql_statements("   \n").is_empty());
    }

    #[test]
    fn test_split_falls_back_for_trigger_bodies() {
        let statements = split_sql_statements(
            "CREATE TRIGGER trg AFTER INSERT ON a BEGIN UPDATE a SET s = 'x;y' WHERE id = NEW.id; END;",
        );
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("'x;y'"));
        assert!(statements[0].ends_with("END"));
    }
}
