//! Picture filename decoding
//!
//! Video API picture URLs end in names like `42_640x360.jpg`:
//! - everything before the first `_` is the video id
//! - the rest splits on its first `.` into dimensions and extension
//!
//! Decoding never fails. Parts that are not present are `None` and
//! [`ThumbnailDescriptor::is_complete`] reports whether all were found.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailDescriptor {
    pub filename: String,
    pub video_id: Option<String>,
    pub dimensions: Option<String>,
    pub extension: Option<String>,
}

impl ThumbnailDescriptor {
    /// Decode the final path segment of `url`; query and fragment are ignored
    pub fn decode(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let filename = path.rsplit('/').next().unwrap_or(path).to_string();

        let mut descriptor = Self {
            filename,
            ..Default::default()
        };

        let Some((video_id, rest)) = descriptor.filename.split_once('_') else {
            return descriptor;
        };
        descriptor.video_id = Some(video_id.to_string());

        if let Some((dimensions, extension)) = rest.split_once('.') {
            descriptor.dimensions = Some(dimensions.to_string());
            descriptor.extension = Some(extension.to_string());
        }

        descriptor
    }

    /// True when video id, dimensions and extension were all found
    pub fn is_complete(&self) -> bool {
        self.video_id.is_some() && self.dimensions.is_some() && self.extension.is_some()
    }

    pub fn video_id_or_empty(&self) -> &str {
        self.video_id.as_deref().unwrap_or_default()
    }

    pub fn extension_or_empty(&self) -> &str {
        self.extension.as_deref().unwrap_or_default()
    }
}
