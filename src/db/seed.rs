//! Pre-seed data for initial database setup.
//!
//! Inserts the default image styles. Uses INSERT OR IGNORE so re-runs are
//! idempotent and operator edits are preserved.

use sqlx::SqlitePool;
use tracing::debug;

struct StyleRow {
    name: &'static str,
    label: &'static str,
    width: i64,
    height: i64,
    mode: &'static str,
}

const DEFAULT_STYLES: &[StyleRow] = &[
    StyleRow {
        name: "thumbnail",
        label: "Thumbnail (100x100)",
        width: 100,
        height: 100,
        mode: "scale",
    },
    StyleRow {
        name: "medium",
        label: "Medium (220x220)",
        width: 220,
        height: 220,
        mode: "scale",
    },
    StyleRow {
        name: "large",
        label: "Large (480x480)",
        width: 480,
        height: 480,
        mode: "scale",
    },
    StyleRow {
        name: "video_wide",
        label: "Video wide (640x360)",
        width: 640,
        height: 360,
        mode: "scale_and_crop",
    },
];

/// Seed default rows, returning how many were inserted
pub async fn run_seeds(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for row in DEFAULT_STYLES {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO image_styles (name, label, width, height, mode)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(row.name)
        .bind(row.label)
        .bind(row.width)
        .bind(row.height)
        .bind(row.mode)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    if inserted > 0 {
        debug!(count = inserted, "Seeded default image styles");
    }
    Ok(inserted)
}
