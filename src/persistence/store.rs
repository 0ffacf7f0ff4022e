//! SQLite-based persistence store

use crate::core::ExecutionStatus;
use crate::persistence::{CacheRecord, EntrySummary, PersistenceBackend, RunSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

/// SQLite store for run history and the cache index
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) a database file
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("crossci");
        std::fs::create_dir_all(&db_dir)?;

        Self::new(db_dir.join("crossci.db")).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                workflow_name TEXT NOT NULL,
                branch TEXT NOT NULL,
                event TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                entries TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workflow_name ON runs(workflow_name);
            CREATE INDEX IF NOT EXISTS idx_started_at ON runs(started_at);

            CREATE TABLE IF NOT EXISTS caches (
                key TEXT PRIMARY KEY,
                stored_path TEXT NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn parse_status(s: &str) -> ExecutionStatus {
        match s {
            "Running" => ExecutionStatus::Running,
            "Completed" => ExecutionStatus::Completed,
            "Failed" => ExecutionStatus::Failed,
            "Cancelled" => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Pending,
        }
    }

    fn run_from_row(row: &SqliteRow) -> Result<RunSummary> {
        let entries: Vec<EntrySummary> = serde_json::from_str(&row.get::<String, _>("entries"))
            .context("Corrupt entries column")?;
        Ok(RunSummary {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            workflow_name: row.get("workflow_name"),
            branch: row.get("branch"),
            event: row.get("event"),
            status: Self::parse_status(&row.get::<String, _>("status")),
            started_at: Self::from_naive(row.get("started_at")),
            completed_at: row
                .get::<Option<NaiveDateTime>, _>("completed_at")
                .map(Self::from_naive),
            entries,
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStore {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, workflow_name, branch, event, status, started_at, completed_at, entries)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(&run.workflow_name)
        .bind(&run.branch)
        .bind(&run.event)
        .bind(format!("{:?}", run.status))
        .bind(Self::to_naive(run.started_at))
        .bind(run.completed_at.map(Self::to_naive))
        .bind(serde_json::to_string(&run.entries)?)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let row = sqlx::query(
            r#"
            SELECT id, workflow_name, branch, event, status, started_at, completed_at, entries
            FROM runs
            WHERE id = ?1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load run")?;

        row.as_ref().map(Self::run_from_row).transpose()
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, workflow_name, branch, event, status, started_at, completed_at, entries
            FROM runs
            WHERE workflow_name = ?1
            ORDER BY started_at DESC
            "#,
        )
        .bind(workflow_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::run_from_row).collect()
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT workflow_name
            FROM runs
            ORDER BY workflow_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflows")?;

        Ok(rows.iter().map(|row| row.get("workflow_name")).collect())
    }

    async fn lookup_cache(&self, key: &str) -> Result<Option<CacheRecord>> {
        let row = sqlx::query(
            "SELECT key, stored_path, size_bytes, created_at FROM caches WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up cache")?;

        Ok(row.map(|row| CacheRecord {
            key: row.get("key"),
            stored_path: row.get("stored_path"),
            size_bytes: row.get::<i64, _>("size_bytes") as u64,
            created_at: Self::from_naive(row.get("created_at")),
        }))
    }

    async fn record_cache(&self, record: &CacheRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO caches (key, stored_path, size_bytes, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&record.key)
        .bind(&record.stored_path)
        .bind(record.size_bytes as i64)
        .bind(Self::to_naive(record.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to record cache")?;

        Ok(())
    }

    async fn forget_cache(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM caches WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .context("Failed to forget cache")?;

        Ok(())
    }
}
