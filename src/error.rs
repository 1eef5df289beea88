//! Error taxonomy for thumbnail reconciliation
//!
//! Item-level failures (`RemoteApi`, `Download`, `Storage`) are counted and
//! logged by the reconciliation job and never abort a batch.
//! `MissingCredentials` is raised before any item is processed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// Transport failure, non-2xx status or malformed body from the video API
    #[error("video API request for '{video_id}' failed: {reason}")]
    RemoteApi { video_id: String, reason: String },

    /// The picture could not be fetched
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// Writing bytes, building a derivative or saving a file record failed
    #[error("storage failure at {location}: {reason}")]
    Storage { location: String, reason: String },

    #[error("video API credentials are not set: {}", .missing.join(", "))]
    MissingCredentials { missing: Vec<&'static str> },
}

impl ThumbnailError {
    pub fn remote_api(video_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::RemoteApi {
            video_id: video_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn download(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn storage(location: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Storage {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ThumbnailResult<T> = Result<T, ThumbnailError>;
