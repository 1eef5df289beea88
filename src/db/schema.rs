//! Static schema for the SQLite database
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS` on every start, so an
//! existing database is left untouched. Column renames or type changes are
//! not handled.

use sqlx::SqlitePool;
use tracing::debug;

const TABLES: &[(&str, &str)] = &[
    (
        "media",
        r#"
        CREATE TABLE IF NOT EXISTS media (
            id TEXT PRIMARY KEY NOT NULL,
            bundle TEXT NOT NULL,
            name TEXT NOT NULL,
            source_url TEXT,
            thumbnail_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "files",
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY NOT NULL,
            uri TEXT NOT NULL,
            filename TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "image_styles",
        r#"
        CREATE TABLE IF NOT EXISTS image_styles (
            name TEXT PRIMARY KEY NOT NULL,
            label TEXT NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            mode TEXT NOT NULL
        )
        "#,
    ),
    (
        "app_settings",
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "batches",
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            id TEXT PRIMARY KEY NOT NULL,
            scope TEXT NOT NULL,
            style TEXT NOT NULL,
            resolver TEXT NOT NULL,
            items TEXT NOT NULL,
            sandbox TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "app_logs",
        r#"
        CREATE TABLE IF NOT EXISTS app_logs (
            id TEXT PRIMARY KEY NOT NULL,
            timestamp TEXT NOT NULL,
            level TEXT NOT NULL,
            target TEXT NOT NULL,
            message TEXT NOT NULL,
            fields TEXT,
            span_name TEXT,
            span_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_media_bundle ON media (bundle)",
    "CREATE INDEX IF NOT EXISTS idx_files_uri ON files (uri)",
    "CREATE INDEX IF NOT EXISTS idx_app_logs_level ON app_logs (level, timestamp)",
];

/// Create every table and index that does not exist yet
pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for (name, sql) in TABLES {
        debug!(table = %name, "Ensuring table");
        sqlx::query(sql).execute(pool).await?;
    }
    for sql in INDEXES {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}
