//! Image style database operations

use anyhow::Result;
use sqlx::SqlitePool;

/// An image style row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StyleRecord {
    pub name: String,
    pub label: String,
    pub width: i64,
    pub height: i64,
    /// `scale` or `scale_and_crop`
    pub mode: String,
}

pub struct ImageStyleRepository {
    pool: SqlitePool,
}

impl ImageStyleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a style by machine name
    pub async fn get(&self, name: &str) -> Result<Option<StyleRecord>> {
        let record = sqlx::query_as::<_, StyleRecord>(
            "SELECT name, label, width, height, mode FROM image_styles WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// All styles ordered by name
    pub async fn list(&self) -> Result<Vec<StyleRecord>> {
        let records = sqlx::query_as::<_, StyleRecord>(
            "SELECT name, label, width, height, mode FROM image_styles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Create or replace a style
    pub async fn upsert(&self, style: &StyleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO image_styles (name, label, width, height, mode)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (name) DO UPDATE SET
                label = ?2,
                width = ?3,
                height = ?4,
                mode = ?5
            "#,
        )
        .bind(&style.name)
        .bind(&style.label)
        .bind(style.width)
        .bind(style.height)
        .bind(&style.mode)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_default_styles_are_seeded() {
        let db = Database::in_memory().await.unwrap();
        let names: Vec<String> = db
            .styles()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["large", "medium", "thumbnail", "video_wide"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_dimensions() {
        let db = Database::in_memory().await.unwrap();
        let styles = db.styles();
        styles
            .upsert(&StyleRecord {
                name: "thumbnail".to_string(),
                label: "Thumbnail".to_string(),
                width: 320,
                height: 180,
                mode: "scale_and_crop".to_string(),
            })
            .await
            .unwrap();

        let style = styles.get("thumbnail").await.unwrap().unwrap();
        assert_eq!((style.width, style.height), (320, 180));
        assert_eq!(style.mode, "scale_and_crop");
    }
}
