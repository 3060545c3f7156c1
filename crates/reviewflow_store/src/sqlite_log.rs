//! Processing log persisted in SQLite.

use crate::error::{Result, StoreError};
use crate::event_log::EventLog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reviewflow_protocol::{LogAction, LogFilter, LogStatus, ProcessingLogEntry};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SqliteEventLog {
    pool: Pool<Sqlite>,
}

impl SqliteEventLog {
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let log = Self { pool };
        log.init_schema().await?;
        Ok(log)
    }

    /// Open (creating if needed) a log database file.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await?;
        Self::new(pool).await
    }

    /// In-memory log (for testing). Single connection so every query sees
    /// the same database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processing_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id TEXT NOT NULL,
                action TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processing_log_lookup ON processing_log(file_id, action, status)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EventLog for SqliteEventLog {
    async fn insert(&self, entry: &ProcessingLogEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO processing_log (file_id, action, status, details, timestamp, retry_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.file_id)
        .bind(entry.action.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.details)
        .bind(entry.timestamp.to_rfc3339())
        .bind(i64::from(entry.retry_count))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<ProcessingLogEntry>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, file_id, action, status, details, timestamp, retry_count FROM processing_log WHERE 1 = 1",
        );
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows: Vec<LogRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_entry() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable processing log row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn count(&self, filter: &LogFilter) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM processing_log WHERE 1 = 1");
        push_filter(&mut qb, filter);
        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &LogFilter) {
    if let Some(file_id) = &filter.file_id {
        qb.push(" AND file_id = ").push_bind(file_id.clone());
    }
    if let Some(action) = filter.action {
        qb.push(" AND action = ").push_bind(action.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    file_id: String,
    action: String,
    status: String,
    details: String,
    timestamp: String,
    retry_count: i64,
}

impl LogRow {
    fn into_entry(self) -> Result<ProcessingLogEntry> {
        let action = LogAction::parse(&self.action)
            .ok_or_else(|| StoreError::Corrupt(format!("log row {}: action '{}'", self.id, self.action)))?;
        let status = LogStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("log row {}: status '{}'", self.id, self.status)))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StoreError::Corrupt(format!("log row {}: timestamp: {}", self.id, e)))?
            .with_timezone(&Utc);
        Ok(ProcessingLogEntry {
            id: Some(self.id),
            file_id: self.file_id,
            action,
            status,
            details: self.details,
            timestamp,
            retry_count: u32::try_from(self.retry_count).unwrap_or(0),
        })
    }
}
