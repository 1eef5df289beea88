//! Media (video record) database operations

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::sqlite_helpers::{new_id, now_iso8601};

/// A video-bearing media record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoRecord {
    pub id: String,
    pub bundle: String,
    pub name: String,
    /// URL of the hosted video (e.g. `https://vimeo.com/76979871`)
    pub source_url: Option<String>,
    /// Id of the currently attached image artifact
    pub thumbnail_id: Option<String>,
}

/// Input for creating a media record
#[derive(Debug, Clone)]
pub struct CreateVideo {
    pub bundle: String,
    pub name: String,
    pub source_url: Option<String>,
    pub thumbnail_id: Option<String>,
}

pub struct MediaRepository {
    pool: SqlitePool,
}

impl MediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a media record
    pub async fn create(&self, input: CreateVideo) -> Result<VideoRecord> {
        let id = new_id();
        let now = now_iso8601();

        sqlx::query(
            r#"
            INSERT INTO media (id, bundle, name, source_url, thumbnail_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(&input.bundle)
        .bind(&input.name)
        .bind(&input.source_url)
        .bind(&input.thumbnail_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve media after insert"))
    }

    /// Get a media record by id
    pub async fn get(&self, id: &str) -> Result<Option<VideoRecord>> {
        let record = sqlx::query_as::<_, VideoRecord>(
            "SELECT id, bundle, name, source_url, thumbnail_id FROM media WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// All records of `bundle` that reference a hosted video, oldest first
    pub async fn list_videos(&self, bundle: &str) -> Result<Vec<VideoRecord>> {
        let records = sqlx::query_as::<_, VideoRecord>(
            r#"
            SELECT id, bundle, name, source_url, thumbnail_id
            FROM media
            WHERE bundle = ?1 AND source_url IS NOT NULL AND source_url != ''
            ORDER BY created_at, id
            "#,
        )
        .bind(bundle)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Attach an image artifact as the record's thumbnail
    pub async fn set_thumbnail(&self, id: &str, file_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE media SET thumbnail_id = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(file_id)
        .bind(now_iso8601())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
