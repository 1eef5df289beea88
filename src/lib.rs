//! Thumbnail rebuilder
//!
//! Rebuilds video thumbnails from a hosted video API: resolves a picture URL
//! per video, stores the full-size picture and a styled derivative, and
//! attaches the derivative to the video record. Runs are batched, resumable
//! and persist their progress after every item.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod services;

pub use app::App;
pub use config::Config;
pub use db::Database;
pub use error::{ThumbnailError, ThumbnailResult};
