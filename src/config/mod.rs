//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path or `sqlite:` URL
    pub database_url: String,

    /// Root directory for stored images (style directories live below it)
    pub files_path: PathBuf,

    /// Base URL of the video API
    pub video_api_url: String,

    /// Public oEmbed endpoint
    pub oembed_url: String,

    /// Media bundle whose records carry videos
    pub video_bundle: String,

    /// Picture width the resolver aims for when choosing a size
    pub target_picture_width: u32,

    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,

    /// Requests per second allowed against the video API
    pub api_requests_per_second: u32,

    /// Minimum level persisted to the error log table
    pub log_db_level: tracing::Level,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_PATH")
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| "./data/thumbnails.db".to_string());

        let log_db_level = lookup("LOG_DB_LEVEL")
            .unwrap_or_else(|| "warn".to_string())
            .parse::<tracing::Level>()
            .context("Invalid LOG_DB_LEVEL")?;

        Ok(Self {
            database_url,

            files_path: PathBuf::from(
                lookup("FILES_PATH").unwrap_or_else(|| "./data/files".to_string()),
            ),

            video_api_url: lookup("VIDEO_API_URL")
                .unwrap_or_else(|| "https://api.vimeo.com".to_string())
                .trim_end_matches('/')
                .to_string(),

            oembed_url: lookup("OEMBED_URL")
                .unwrap_or_else(|| "https://vimeo.com/api/oembed.json".to_string()),

            video_bundle: lookup("VIDEO_BUNDLE").unwrap_or_else(|| "vimeo".to_string()),

            target_picture_width: lookup("THUMBNAIL_TARGET_WIDTH")
                .unwrap_or_else(|| "640".to_string())
                .parse()
                .context("Invalid THUMBNAIL_TARGET_WIDTH")?,

            http_timeout: Duration::from_secs(
                lookup("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .context("Invalid HTTP_TIMEOUT_SECS")?,
            ),

            api_requests_per_second: lookup("API_REQUESTS_PER_SECOND")
                .unwrap_or_else(|| "2".to_string())
                .parse()
                .unwrap_or(2),

            log_db_level,
        })
    }
}
