use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tern_migrate::{sql, Dialect, DialectKind, MigrationRunner, Registry};

/// In-memory SQLite pool; a single connection that never expires keeps the
/// database alive for the whole test.
pub async fn sqlite_pool() -> AnyPool {
    sqlx::any::install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite")
}

pub fn sqlite_dialect() -> Dialect {
    Dialect::new(DialectKind::Sqlite)
}

/// Registry with `1 init`, `2 add_users` and `3 add_index`
pub fn sample_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            1,
            "init",
            Some(sql("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)")),
            Some(sql("DROP TABLE settings")),
        )
        .unwrap();
    registry
        .register(
            2,
            "add_users",
            Some(sql("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)")),
            Some(sql("DROP TABLE users")),
        )
        .unwrap();
    registry
        .register(
            3,
            "add_index",
            Some(sql("CREATE INDEX idx_users_email ON users (email)")),
            Some(sql("DROP INDEX idx_users_email")),
        )
        .unwrap();
    registry
}

pub async fn runner_with(registry: Registry) -> (MigrationRunner, AnyPool) {
    let pool = sqlite_pool().await;
    let runner = MigrationRunner::new(registry, pool.clone(), sqlite_dialect());
    (runner, pool)
}

pub async fn table_exists(pool: &AnyPool, table: &str) -> bool {
    sqlx::query(&format!("SELECT * FROM {}", table))
        .fetch_all(pool)
        .await
        .is_ok()
}
