//! Migration configuration
//!
//! Values come from the environment with defaults; each remembers where it
//! came from so diagnostics can explain an unexpected setting.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::MigrateResult;
use crate::migrations::dialect::{Dialect, DialectKind, DEFAULT_TABLE_NAME};

pub const ENV_MIGRATIONS_DIR: &str = "TERN_MIGRATIONS_DIR";
pub const ENV_TABLE: &str = "TERN_TABLE";
pub const ENV_DIALECT: &str = "TERN_DIALECT";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Configuration source information for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default(String),
    /// Value provided programmatically
    Programmatic,
}

impl ConfigSource {
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::EnvVar(var) => write!(f, "Environment variable: {}", var),
            ConfigSource::Default(value) => write!(f, "Default value: {}", value),
            ConfigSource::Programmatic => write!(f, "Programmatically set"),
        }
    }
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where SQL migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for the version ledger
    pub table_name: String,
    pub dialect: DialectKind,
    pub database_url: Option<String>,
    sources: HashMap<&'static str, ConfigSource>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        let mut sources = HashMap::new();
        sources.insert("migrations_dir", ConfigSource::Default("migrations".to_string()));
        sources.insert("table_name", ConfigSource::Default(DEFAULT_TABLE_NAME.to_string()));
        sources.insert("dialect", ConfigSource::Default("postgres".to_string()));

        Self {
            migrations_dir: PathBuf::from("migrations"),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            dialect: DialectKind::Postgres,
            database_url: None,
            sources,
        }
    }
}

impl MigrationConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> MigrateResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> MigrateResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_MIGRATIONS_DIR) {
            config.migrations_dir = PathBuf::from(dir);
            config.record("migrations_dir", ConfigSource::EnvVar(ENV_MIGRATIONS_DIR.to_string()));
        }
        if let Some(table) = lookup(ENV_TABLE) {
            config.table_name = table;
            config.record("table_name", ConfigSource::EnvVar(ENV_TABLE.to_string()));
        }
        if let Some(dialect) = lookup(ENV_DIALECT) {
            config.dialect = dialect.parse()?;
            config.record("dialect", ConfigSource::EnvVar(ENV_DIALECT.to_string()));
        }
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            config.database_url = Some(url);
            config.record("database_url", ConfigSource::EnvVar(ENV_DATABASE_URL.to_string()));
        }

        config.dialect()?;
        Ok(config)
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self.record("migrations_dir", ConfigSource::Programmatic);
        self
    }

    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = table.into();
        self.record("table_name", ConfigSource::Programmatic);
        self
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self.record("dialect", ConfigSource::Programmatic);
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self.record("database_url", ConfigSource::Programmatic);
        self
    }

    /// Ledger dialect described by this configuration
    pub fn dialect(&self) -> MigrateResult<Dialect> {
        Dialect::with_table(self.dialect, self.table_name.clone())
    }

    /// Where a setting came from, if it was set at all
    pub fn source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    fn record(&mut self, key: &'static str, source: ConfigSource) {
        self.sources.insert(key, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.dialect, DialectKind::Postgres);
        assert!(config.database_url.is_none());
        assert!(config.source("dialect").unwrap().is_default());
        assert!(config.source("database_url").is_none());
    }

    #[test]
    fn test_from_lookup() {
        let config = MigrationConfig::from_lookup(|key| match key {
            ENV_DIALECT => Some("sqlite3".to_string()),
            ENV_TABLE => Some("schema_ledger".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert_eq!(config.dialect().unwrap().table_name(), "schema_ledger");
        assert!(config.source("table_name").unwrap().is_env_var());
        assert!(config.source("migrations_dir").unwrap().is_default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(MigrationConfig::from_lookup(|key| {
            (key == ENV_DIALECT).then(|| "oracle".to_string())
        })
        .is_err());
        assert!(MigrationConfig::from_lookup(|key| {
            (key == ENV_TABLE).then(|| "ledger; DROP".to_string())
        })
        .is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(ENV_MIGRATIONS_DIR, "db/migrations");
        std::env::set_var(ENV_DATABASE_URL, "sqlite::memory:");
        let config = MigrationConfig::from_env();
        std::env::remove_var(ENV_MIGRATIONS_DIR);
        std::env::remove_var(ENV_DATABASE_URL);

        let config = config.unwrap();
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(
            config.source("database_url"),
            Some(&ConfigSource::EnvVar(ENV_DATABASE_URL.to_string()))
        );
    }

    #[test]
    fn test_builder_marks_programmatic() {
        let config = MigrationConfig::default().with_dialect(DialectKind::MySql);
        assert_eq!(config.source("dialect"), Some(&ConfigSource::Programmatic));
    }
}
