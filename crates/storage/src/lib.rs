//! Storage layer: SQLite pool setup and migrations.
//!
//! Holds DB pool setup and migration runner.

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a pool for either a `sqlite:` URL or a plain file path.
///
/// For plain paths the parent directory is created first and the database
/// file is created if it does not exist yet.
pub async fn connect(database: &str) -> anyhow::Result<SqlitePool> {
    let in_memory = database.contains(":memory:") || database.contains("mode=memory");
    let opts = if database.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(database)
            .with_context(|| format!("invalid database url: {database}"))?
    } else {
        let path = PathBuf::from(database);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        SqliteConnectOptions::new()
            .filename(&path)
            .journal_mode(SqliteJournalMode::Wal)
    };
    let opts = opts.create_if_missing(true).busy_timeout(BUSY_TIMEOUT);

    let max_connections = if in_memory { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(opts)
        .await
        .with_context(|| format!("failed to open database {database}"))?;
    tracing::debug!(database, max_connections, "database opened");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations.
    // Safe to run multiple times (idempotent).
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
