//! SQL dialects for the version ledger
//!
//! Every ledger query orders by the surrogate `id` column so that "most
//! recent" always means insertion order, independent of clock resolution.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateError, MigrateResult};

/// Default name of the ledger table
pub const DEFAULT_TABLE_NAME: &str = "tern_db_version";

/// Database engines with a known ledger vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DialectKind {
    Postgres,
    MySql,
    Sqlite,
    Redshift,
}

impl DialectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Postgres => "postgres",
            DialectKind::MySql => "mysql",
            DialectKind::Sqlite => "sqlite3",
            DialectKind::Redshift => "redshift",
        }
    }
}

impl FromStr for DialectKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::MySql),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            "redshift" => Ok(DialectKind::Redshift),
            _ => Err(MigrateError::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger SQL for one database engine and one table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    kind: DialectKind,
    table: String,
}

impl Dialect {
    /// Dialect using [`DEFAULT_TABLE_NAME`]
    pub fn new(kind: DialectKind) -> Self {
        Self {
            kind,
            table: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Dialect with a custom ledger table name
    ///
    /// The name is interpolated into SQL, so only identifiers made of ASCII
    /// alphanumerics and underscores (optionally schema-qualified) are accepted.
    pub fn with_table(kind: DialectKind, table: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { kind, table })
    }

    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// SQL creating the ledger table
    pub fn create_version_table_sql(&self) -> String {
        let table = &self.table;
        match self.kind {
            DialectKind::Postgres => format!(
                "CREATE TABLE {table} (\n    \
                    id serial NOT NULL,\n    \
                    version_id bigint NOT NULL,\n    \
                    is_applied boolean NOT NULL,\n    \
                    tstamp timestamp NULL DEFAULT now(),\n    \
                    PRIMARY KEY(id)\n\
                )"
            ),
            DialectKind::MySql => format!(
                "CREATE TABLE {table} (\n    \
                    id serial NOT NULL,\n    \
                    version_id bigint NOT NULL,\n    \
                    is_applied boolean NOT NULL,\n    \
                    tstamp timestamp NULL DEFAULT now(),\n    \
                    PRIMARY KEY(id)\n\
                )"
            ),
            DialectKind::Sqlite => format!(
                "CREATE TABLE {table} (\n    \
                    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
                    version_id INTEGER NOT NULL,\n    \
                    is_applied INTEGER NOT NULL,\n    \
                    tstamp TEXT DEFAULT (datetime('now'))\n\
                )"
            ),
            DialectKind::Redshift => format!(
                "CREATE TABLE {table} (\n    \
                    id integer NOT NULL identity(1, 1),\n    \
                    version_id bigint NOT NULL,\n    \
                    is_applied boolean NOT NULL,\n    \
                    tstamp timestamp NULL DEFAULT sysdate,\n    \
                    PRIMARY KEY(id)\n\
                )"
            ),
        }
    }

    /// SQL appending one ledger row; binds `(version_id, is_applied)`
    pub fn insert_version_sql(&self) -> String {
        match self.kind {
            DialectKind::Postgres | DialectKind::Redshift => format!(
                "INSERT INTO {} (version_id, is_applied) VALUES ($1, $2)",
                self.table
            ),
            DialectKind::MySql | DialectKind::Sqlite => format!(
                "INSERT INTO {} (version_id, is_applied) VALUES (?, ?)",
                self.table
            ),
        }
    }

    /// SQL returning `(version_id, is_applied)` for every row, newest first
    ///
    /// `version_id` comes back as text; the `Any` sqlite mapping narrows
    /// integer columns to 32 bits on read.
    pub fn version_query_sql(&self) -> String {
        format!(
            "SELECT {}, is_applied FROM {} ORDER BY id DESC",
            self.text_column("version_id"),
            self.table
        )
    }

    /// SQL returning `(tstamp, is_applied)` of the newest row for one version
    ///
    /// Binds `version_id`. The timestamp is returned as text.
    pub fn migration_status_sql(&self) -> String {
        match self.kind {
            DialectKind::Postgres | DialectKind::Redshift => format!(
                "SELECT CAST(tstamp AS TEXT), is_applied FROM {} WHERE version_id = $1 ORDER BY id DESC LIMIT 1",
                self.table
            ),
            DialectKind::MySql => format!(
                "SELECT CAST(tstamp AS CHAR), is_applied FROM {} WHERE version_id = ? ORDER BY id DESC LIMIT 1",
                self.table
            ),
            DialectKind::Sqlite => format!(
                "SELECT tstamp, is_applied FROM {} WHERE version_id = ? ORDER BY id DESC LIMIT 1",
                self.table
            ),
        }
    }

    /// SQL returning `(version_id, tstamp, is_applied)` for every row, newest first
    pub fn history_query_sql(&self) -> String {
        let tstamp = match self.kind {
            DialectKind::Sqlite => "tstamp".to_string(),
            _ => self.text_column("tstamp"),
        };
        format!(
            "SELECT {}, {tstamp}, is_applied FROM {} ORDER BY id DESC",
            self.text_column("version_id"),
            self.table
        )
    }

    fn text_column(&self, column: &str) -> String {
        match self.kind {
            DialectKind::MySql => format!("CAST({column} AS CHAR)"),
            _ => format!("CAST({column} AS TEXT)"),
        }
    }
}

fn validate_table_name(table: &str) -> MigrateResult<()> {
    let valid_part = |part: &str| {
        !part.is_empty()
            && !part.starts_with(|c: char| c.is_ascii_digit())
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
        return Err(MigrateError::configuration(format!(
            "invalid ledger table name {table:?}"
        )));
    }
    Ok(())
}
