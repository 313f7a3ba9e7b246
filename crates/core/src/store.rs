//! Durable record of every known path and its lifecycle policy.
//!
//! All writes are single-statement upserts keyed on `files.path`, so two
//! writers on the same path are serialized by SQLite itself.

use crate::models::{Classification, ClassificationError, FileRecord};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PathStore {
    pool: SqlitePool,
}

impl PathStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to `database` and makes sure the schema exists.
    pub async fn open(database: &str) -> anyhow::Result<Self> {
        let pool = storage::connect(database).await.context("db connect")?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        storage::migrate(&self.pool).await.context("db migrate")
    }

    /// Records that `path` was seen. New paths start unclassified; known
    /// paths only get `last_modified` refreshed.
    ///
    /// Returns the classification the record holds after the write.
    pub async fn upsert_seen(
        &self,
        path: &Path,
        last_modified: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Classification> {
        let code: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO files (path, classification, last_modified)
            VALUES (?1, 0, ?2)
            ON CONFLICT(path) DO UPDATE SET
                last_modified = excluded.last_modified
            RETURNING classification
            "#,
        )
        .bind(path_key(path)?)
        .bind(last_modified)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upsert seen {}", path.display()))?;
        Ok(Classification::try_from(code)?)
    }

    /// Stores a decision for `path`, overwriting any earlier one.
    pub async fn upsert_classification(
        &self,
        path: &Path,
        classification: Classification,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if !classification.is_policy() {
            return Err(ClassificationError::Unclassified(path.display().to_string()).into());
        }
        sqlx::query(
            r#"
            INSERT INTO files (path, classification, classified_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(path) DO UPDATE SET
                classification = excluded.classification,
                classified_at = excluded.classified_at
            "#,
        )
        .bind(path_key(path)?)
        .bind(classification.code())
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert classification {}", path.display()))?;
        Ok(())
    }

    pub async fn get(&self, path: &Path) -> anyhow::Result<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT path, classification, classified_at, last_modified FROM files WHERE path = ?1",
        )
        .bind(path_key(path)?)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    /// Lists records ordered by path, optionally only one classification.
    pub async fn list(&self, filter: Option<Classification>) -> anyhow::Result<Vec<FileRecord>> {
        let rows = match filter {
            Some(c) => {
                sqlx::query(
                    "SELECT path, classification, classified_at, last_modified FROM files WHERE classification = ?1 ORDER BY path",
                )
                .bind(c.code())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT path, classification, classified_at, last_modified FROM files ORDER BY path",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(record_from_row).collect()
    }

    /// Record count per classification, unclassified first.
    pub async fn summary(&self) -> anyhow::Result<Vec<(Classification, i64)>> {
        let rows = sqlx::query(
            "SELECT classification, COUNT(*) FROM files GROUP BY classification ORDER BY classification",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut counts = Vec::new();
        for row in rows {
            let code: i64 = row.get(0);
            counts.push((Classification::try_from(code)?, row.get::<i64, _>(1)));
        }
        Ok(counts)
    }
}

/// Paths are stored as exact UTF-8 text. A lossy conversion could map two
/// different names onto one record, so other paths are refused.
fn path_key(path: &Path) -> anyhow::Result<&str> {
    path.to_str()
        .with_context(|| format!("path is not valid UTF-8: {}", path.display()))
}

fn record_from_row(row: &SqliteRow) -> anyhow::Result<FileRecord> {
    let code: i64 = row.try_get("classification")?;
    Ok(FileRecord {
        path: row.try_get("path")?,
        classification: Classification::try_from(code)?,
        classified_at: row.try_get("classified_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}
