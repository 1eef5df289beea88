//! Application logs database operations
//!
//! The `app_logs` table is the error log operators are pointed at when a batch
//! finishes with errored items.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// A persisted log event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AppLog {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    /// Structured fields as a JSON object
    pub fields: Option<String>,
    pub span_name: Option<String>,
    pub span_id: Option<String>,
    pub created_at: String,
}

/// Logs repository for database operations
pub struct LogsRepository {
    pool: SqlitePool,
}

impl LogsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch of logs in one transaction
    pub async fn insert_batch(&self, logs: &[AppLog]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        let sql = r#"
            INSERT INTO app_logs (id, timestamp, level, target, message, fields, span_name, span_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#;
        for log in logs {
            sqlx::query(sql)
                .bind(&log.id)
                .bind(&log.timestamp)
                .bind(&log.level)
                .bind(&log.target)
                .bind(&log.message)
                .bind(&log.fields)
                .bind(&log.span_name)
                .bind(&log.span_id)
                .bind(&log.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Most recent logs first
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<AppLog>> {
        let logs = sqlx::query_as::<_, AppLog>(
            r#"
            SELECT id, timestamp, level, target, message, fields, span_name, span_id, created_at
            FROM app_logs
            ORDER BY timestamp DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn log(id: &str, timestamp: &str, message: &str) -> AppLog {
        AppLog {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            level: "WARN".to_string(),
            target: "thumbnail_rebuilder::jobs".to_string(),
            message: message.to_string(),
            fields: Some(r#"{"media_id":"m1"}"#.to_string()),
            span_name: None,
            span_id: None,
            created_at: timestamp.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_recent() {
        let db = Database::in_memory().await.unwrap();
        let logs = db.logs();

        logs.insert_batch(&[
            log("a", "2024-01-01T00:00:00Z", "first"),
            log("b", "2024-01-02T00:00:00Z", "second"),
        ])
        .await
        .unwrap();

        let recent = logs.list_recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message, "second");
    }
}
