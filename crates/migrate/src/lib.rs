//! # tern-migrate: ordered, reversible schema migrations
//!
//! Migrations are registered into a [`Registry`], ordered by the sequencer
//! and applied one transaction at a time. Which version a database is at is
//! never stored as a flag: it is derived from an append-only ledger table.
//!
//! ```rust,ignore
//! use tern_migrate::{sql, Dialect, DialectKind, MigrationRunner, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register(1, "init", Some(sql("CREATE TABLE users (id INTEGER)")), Some(sql("DROP TABLE users")))?;
//!
//! let runner = MigrationRunner::from_url(registry, "sqlite::memory:", Dialect::new(DialectKind::Sqlite)).await?;
//! runner.up().await?;
//! ```

pub mod config;
pub mod error;
pub mod migrations;

pub use config::{ConfigSource, MigrationConfig};
pub use error::{BoxError, MigrateError, MigrateResult};
pub use migrations::*;
