//! Error types for the migration engine
//!
//! Configuration mistakes, lookup misses, failed migration units and ledger
//! I/O all surface as [`MigrateError`]. The library never terminates the
//! process; the binary decides what is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by migration units
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("duplicate version {version} detected: {name:?} conflicts with {existing:?}")]
    DuplicateVersion {
        version: i64,
        name: String,
        existing: String,
    },

    #[error("failed to apply migration {version}_{name}: migration is not registered with executable steps")]
    Unregistered { version: i64, name: String },

    #[error("no current version found")]
    NoCurrentVersion,

    #[error("no next version found")]
    NoNextVersion,

    #[error("FAIL {version}_{name} ({source}), quitting migration")]
    Execution {
        version: i64,
        name: String,
        source: BoxError,
    },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid migration file {path}: {message}")]
    MigrationFile { path: PathBuf, message: String },

    #[error("failed to create file: {0} already exists")]
    FileExists(PathBuf),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{0:?}: unknown dialect")]
    UnknownDialect(String),

    #[error("{0:?}: no such command")]
    UnknownCommand(String),

    #[error("version must be a number (got '{0}')")]
    InvalidVersion(String),

    #[error("{0}")]
    Usage(String),
}

impl MigrateError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new ledger error
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger(message.into())
    }

    /// Create a new migration file error
    pub fn migration_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MigrationFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Lookup misses signal an exhausted sequence rather than a failure
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::NoCurrentVersion | Self::NoNextVersion)
    }

    /// Check if the error is a configuration mistake
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateVersion { .. }
                | Self::Unregistered { .. }
                | Self::Configuration { .. }
                | Self::UnknownDialect(_)
                | Self::UnknownCommand(_)
                | Self::InvalidVersion(_)
                | Self::Usage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_classification() {
        assert!(MigrateError::NoCurrentVersion.is_lookup());
        assert!(MigrateError::NoNextVersion.is_lookup());
        assert!(!MigrateError::ledger("boom").is_lookup());
    }

    #[test]
    fn test_execution_error_names_migration() {
        let err = MigrateError::Execution {
            version: 2,
            name: "add_users".to_string(),
            source: "syntax error".into(),
        };
        let message = err.to_string();
        assert!(message.contains("2_add_users"));
        assert!(message.contains("syntax error"));
    }

    #[test]
    fn test_configuration_classification() {
        let err = MigrateError::DuplicateVersion {
            version: 1,
            name: "b".to_string(),
            existing: "a".to_string(),
        };
        assert!(err.is_configuration());
        assert!(MigrateError::UnknownCommand("fly".to_string())
            .to_string()
            .contains("no such command"));
    }
}
