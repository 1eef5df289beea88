//! Persisted batch runs
//!
//! A batch row holds everything needed to resume a reconciliation run: the
//! options it was started with, the item snapshot and the sandbox (cursor and
//! counters) as of the last completed tick.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use sqlx::SqlitePool;

use super::sqlite_helpers::{new_id, now_iso8601};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Running,
    Finished,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Running => "running",
            BatchStatus::Finished => "finished",
            BatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(BatchStatus::Running),
            "finished" => Ok(BatchStatus::Finished),
            "failed" => Ok(BatchStatus::Failed),
            other => anyhow::bail!("Unknown batch status '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub id: String,
    pub scope: String,
    pub style: String,
    pub resolver: String,
    /// JSON array of job items
    pub items: String,
    /// JSON sandbox
    pub sandbox: String,
    pub status: BatchStatus,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CreateBatch {
    pub scope: String,
    pub style: String,
    pub resolver: String,
    pub items: String,
    pub sandbox: String,
}

type BatchRow = (String, String, String, String, String, String, String, String, String);

fn from_row(r: BatchRow) -> Result<BatchRecord> {
    Ok(BatchRecord {
        id: r.0,
        scope: r.1,
        style: r.2,
        resolver: r.3,
        items: r.4,
        sandbox: r.5,
        status: r.6.parse()?,
        created_at: r.7,
        updated_at: r.8,
    })
}

pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, batch: CreateBatch) -> Result<BatchRecord> {
        let id = new_id();
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO batches (id, scope, style, resolver, items, sandbox, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&batch.scope)
        .bind(&batch.style)
        .bind(&batch.resolver)
        .bind(&batch.items)
        .bind(&batch.sandbox)
        .bind(BatchStatus::Running.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve batch after insert"))
    }

    pub async fn get(&self, id: &str) -> Result<Option<BatchRecord>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, scope, style, resolver, items, sandbox, status, created_at, updated_at
            FROM batches WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    /// Persist the sandbox after a tick
    pub async fn save_sandbox(&self, id: &str, sandbox: &str) -> Result<()> {
        let result = sqlx::query("UPDATE batches SET sandbox = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(sandbox)
            .bind(now_iso8601())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Batch {} not found", id);
        }
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: BatchStatus) -> Result<()> {
        sqlx::query("UPDATE batches SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(now_iso8601())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
