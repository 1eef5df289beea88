//! File (image artifact) repository
//!
//! Rows describe images stored below the files root. A row's `uri` is
//! relative to that root; `filename` keeps the name the image was
//! downloaded under even after the row is re-pointed to a derivative.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::sqlite_helpers::{new_id, now_iso8601};

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub id: String,
    pub uri: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// Input for saving a freshly written file
pub struct NewFile {
    pub uri: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

type FileRow = (String, String, String, String, i64);

fn from_row(r: FileRow) -> ImageArtifact {
    ImageArtifact {
        id: r.0,
        uri: r.1,
        filename: r.2,
        mime_type: r.3,
        size_bytes: r.4,
    }
}

// ============================================================================
// Repository
// ============================================================================

pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a file by id
    pub async fn get(&self, id: &str) -> Result<Option<ImageArtifact>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT id, uri, filename, mime_type, size_bytes FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Most recently updated file stored at `uri`
    pub async fn find_by_uri(&self, uri: &str) -> Result<Option<ImageArtifact>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, uri, filename, mime_type, size_bytes
            FROM files
            WHERE uri = ?
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Save a file, replacing the row already stored at the same uri
    pub async fn save_replace(&self, file: NewFile) -> Result<ImageArtifact> {
        let now = now_iso8601();

        if let Some(existing) = self.find_by_uri(&file.uri).await? {
            sqlx::query(
                r#"
                UPDATE files
                SET filename = ?, mime_type = ?, size_bytes = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&file.filename)
            .bind(&file.mime_type)
            .bind(file.size_bytes)
            .bind(&now)
            .bind(&existing.id)
            .execute(&self.pool)
            .await?;

            return self
                .get(&existing.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("File vanished while replacing"));
        }

        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO files (id, uri, filename, mime_type, size_bytes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&file.uri)
        .bind(&file.filename)
        .bind(&file.mime_type)
        .bind(file.size_bytes)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to store file"))
    }

    /// Point an existing row at a different stored image
    pub async fn update_location(
        &self,
        id: &str,
        uri: &str,
        size_bytes: i64,
    ) -> Result<ImageArtifact> {
        sqlx::query("UPDATE files SET uri = ?, size_bytes = ?, updated_at = ? WHERE id = ?")
            .bind(uri)
            .bind(size_bytes)
            .bind(now_iso8601())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("File {} not found", id))
    }
}
