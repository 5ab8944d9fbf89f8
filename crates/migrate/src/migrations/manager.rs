//! Migration Manager - File system operations for migrations
//!
//! Handles scaffolding, loading and parsing `<version>_<name>.sql` migration
//! files from the migrations directory.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::definitions::{Migration, SqlStep};
use super::registry::Registry;
use crate::config::MigrationConfig;
use crate::error::{MigrateError, MigrateResult};
use std::sync::Arc;

const UP_MARKER: &str = "-- Up migration";
const DOWN_MARKER: &str = "-- Down migration";

/// Migration manager for creating and loading SQL migrations
pub struct MigrationManager {
    config: MigrationConfig,
}

impl MigrationManager {
    /// Create a new migration manager with default configuration
    pub fn new() -> Self {
        Self::with_config(MigrationConfig::default())
    }

    /// Create a new migration manager with custom configuration
    pub fn with_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Write a blank, timestamp-versioned migration file
    ///
    /// Fails with [`MigrateError::FileExists`] instead of overwriting.
    pub fn create_migration(&self, name: &str) -> MigrateResult<PathBuf> {
        validate_migration_name(name)?;
        fs::create_dir_all(&self.config.migrations_dir)?;

        let version = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let path = self
            .config
            .migrations_dir
            .join(format!("{}_{}.sql", version, name));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(MigrateError::FileExists(path))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(migration_template(name, &version).as_bytes())?;

        tracing::info!("Created new file: {}", path.display());
        Ok(path)
    }

    /// Load all SQL migrations from the migrations directory, sorted by version
    ///
    /// A missing directory is an empty set, not an error.
    pub fn load_migrations(&self) -> MigrateResult<Vec<Migration>> {
        let dir = &self.config.migrations_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut migrations = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "sql") {
                migrations.push(self.parse_migration_file(&path)?);
            }
        }

        migrations.sort_by_key(|m| m.version);
        tracing::debug!(count = migrations.len(), dir = %dir.display(), "loaded SQL migrations");
        Ok(migrations)
    }

    /// Load SQL migrations and register them
    pub fn register_all(&self, registry: &mut Registry) -> MigrateResult<usize> {
        let migrations = self.load_migrations()?;
        let count = migrations.len();
        for migration in migrations {
            registry.add(migration)?;
        }
        Ok(count)
    }

    fn parse_migration_file(&self, path: &Path) -> MigrateResult<Migration> {
        let version = numeric_component(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|stem| stem.split_once('_'))
            .map(|(_, name)| name.to_string())
            .ok_or_else(|| MigrateError::migration_file(path, "invalid migration filename"))?;

        let content = fs::read_to_string(path)?;
        let (up_sql, down_sql) = parse_migration_content(&content);

        Ok(Migration::new(
            version,
            name,
            Some(Arc::new(SqlStep::new(up_sql))),
            Some(Arc::new(SqlStep::new(down_sql))),
        ))
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Version encoded in a `<version>_<name>.sql` filename
///
/// Versions must be positive; 0 is reserved for the ledger baseline.
pub fn numeric_component(path: &Path) -> MigrateResult<i64> {
    if path.extension().map_or(true, |ext| ext != "sql") {
        return Err(MigrateError::migration_file(path, "not a recognized migration file type"));
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MigrateError::migration_file(path, "invalid migration filename"))?;
    let (prefix, _) = stem
        .split_once('_')
        .ok_or_else(|| MigrateError::migration_file(path, "no separator found"))?;

    let version: i64 = prefix
        .parse()
        .map_err(|_| MigrateError::migration_file(path, format!("{:?} is not a version number", prefix)))?;
    if version <= 0 {
        return Err(MigrateError::migration_file(path, "migration IDs must be greater than zero"));
    }
    Ok(version)
}

/// Split file content into its up and down SQL
///
/// Comment lines are dropped; anything before the first marker is ignored.
pub fn parse_migration_content(content: &str) -> (String, String) {
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = Section::Preamble;

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(marker) = section_marker(trimmed) {
            section = marker;
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        match section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Preamble => {}
        }
    }

    (
        up_sql.join("\n").trim().to_string(),
        down_sql.join("\n").trim().to_string(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

fn section_marker(line: &str) -> Option<Section> {
    let comment = line.strip_prefix("--")?.trim().to_lowercase();
    match comment.as_str() {
        "up" | "up migration" => Some(Section::Up),
        "down" | "down migration" => Some(Section::Down),
        _ => None,
    }
}

fn validate_migration_name(name: &str) -> MigrateResult<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(MigrateError::Usage(format!(
            "migration name {:?} may only contain letters, digits, '_' and '-'",
            name
        )));
    }
    Ok(())
}

fn migration_template(name: &str, version: &str) -> String {
    format!(
        "-- Migration: {}\n\
         -- Version: {}\n\n\
         {}\n\n\n\
         {}\n\n",
        name, version, UP_MARKER, DOWN_MARKER
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> MigrationManager {
        MigrationManager::with_config(MigrationConfig::default().with_migrations_dir(dir.path()))
    }

    #[test]
    fn test_numeric_component() {
        assert_eq!(numeric_component(Path::new("20240101120000_init.sql")).unwrap(), 20240101120000);
        assert_eq!(numeric_component(Path::new("db/3_add_users.sql")).unwrap(), 3);
        assert!(numeric_component(Path::new("3_add_users.txt")).is_err());
        assert!(numeric_component(Path::new("add_users.sql")).is_err());
        assert!(numeric_component(Path::new("3.sql")).is_err());
        assert!(numeric_component(Path::new("0_baseline.sql")).is_err());
        assert!(numeric_component(Path::new("-4_negative.sql")).is_err());
    }

    #[test]
    fn test_parse_migration_content() {
        let content = "-- Migration: users\n\
                       -- Up migration\n\
                       CREATE TABLE users (id INTEGER);\n\
                       -- a comment\n\
                       CREATE INDEX idx ON users (id);\n\
                       -- Down migration\n\
                       DROP TABLE users;\n";
        let (up, down) = parse_migration_content(content);
        assert_eq!(up, "CREATE TABLE users (id INTEGER);\nCREATE INDEX idx ON users (id);");
        assert_eq!(down, "DROP TABLE users;");
    }

    #[test]
    fn test_create_migration() {
        let temp_dir = TempDir::new().unwrap();
        let path = manager(&temp_dir).create_migration("create_users_table").unwrap();

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.ends_with("_create_users_table.sql"));
        assert_eq!(filename.split('_').next().unwrap().len(), 14);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(UP_MARKER));
        assert!(content.contains(DOWN_MARKER));
        assert_eq!(parse_migration_content(&content), (String::new(), String::new()));
    }

    #[test]
    fn test_create_migration_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        // the version has one-second resolution, so retry until both land in the same second
        loop {
            let first = manager.create_migration("dup").unwrap();
            match manager.create_migration("dup") {
                Err(MigrateError::FileExists(path)) => {
                    assert_eq!(path, first);
                    break;
                }
                Ok(_) => continue,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_create_migration_rejects_bad_names() {
        let temp_dir = TempDir::new().unwrap();
        assert!(manager(&temp_dir).create_migration("../escape").is_err());
        assert!(manager(&temp_dir).create_migration("").is_err());
    }

    #[test]
    fn test_load_migrations() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("2_add_posts.sql"),
            "-- Up migration\nCREATE TABLE posts (id INTEGER);\n-- Down migration\nDROP TABLE posts;",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("1_add_users.sql"),
            "-- Up migration\nCREATE TABLE users (id INTEGER);\n-- Down migration\nDROP TABLE users;",
        )
        .unwrap();
        fs::write(temp_dir.path().join("README.md"), "not a migration").unwrap();

        let manager = manager(&temp_dir);
        let migrations = manager.load_migrations().unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[0].name, "add_users");
        assert_eq!(migrations[1].name, "add_posts");
        assert!(migrations.iter().all(|m| m.registered && m.up.is_some() && m.down.is_some()));

        let mut registry = Registry::new();
        assert_eq!(manager.register_all(&mut registry).unwrap(), 2);
    }

    #[test]
    fn test_load_duplicate_versions_fails() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("1_a.sql"), "-- Up migration\n").unwrap();
        fs::write(temp_dir.path().join("01_b.sql"), "-- Up migration\n").unwrap();

        let mut registry = Registry::new();
        let err = manager(&temp_dir).register_all(&mut registry).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateVersion { version: 1, .. }));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_config(
            MigrationConfig::default().with_migrations_dir(temp_dir.path().join("absent")),
        );
        assert!(manager.load_migrations().unwrap().is_empty());
    }
}
