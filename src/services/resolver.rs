//! Thumbnail URL resolution
//!
//! Turns a video's remote reference (its page URL) into the URL of a picture
//! to download. Two strategies exist:
//! - [`ApiPictureResolver`] reads the picture ladder from the privileged API
//! - [`OEmbedPictureResolver`] asks the public oEmbed endpoint first and falls
//!   back to the API for private or hidden videos
//!
//! Returned URLs keep scheme, host and path; query string and fragment are
//! dropped.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use tracing::{debug, info};
use url::Url;

use super::vimeo::{VimeoClient, pick_nearest};
use crate::error::{ThumbnailError, ThumbnailResult};

#[async_trait]
pub trait ThumbnailUrlResolver: Send + Sync {
    /// Strategy name, as stored on a batch
    fn kind(&self) -> ResolverKind;

    /// Resolve a picture URL. `Ok(None)` means the video has no picture.
    async fn resolve(&self, remote_ref: &str) -> ThumbnailResult<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResolverKind {
    /// Picture ladder from the video API
    #[default]
    Api,
    /// oEmbed thumbnail, falling back to the API
    #[value(name = "oembed")]
    OEmbed,
}

impl ResolverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverKind::Api => "api",
            ResolverKind::OEmbed => "oembed",
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolverKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "api" => Ok(ResolverKind::Api),
            "oembed" => Ok(ResolverKind::OEmbed),
            other => anyhow::bail!("Unknown resolver '{}' (expected api or oembed)", other),
        }
    }
}

/// Build the resolver for `kind`
pub fn build_resolver(
    kind: ResolverKind,
    client: Arc<VimeoClient>,
    target_width: u32,
) -> Arc<dyn ThumbnailUrlResolver> {
    let api = ApiPictureResolver::new(client.clone(), target_width);
    match kind {
        ResolverKind::Api => Arc::new(api),
        ResolverKind::OEmbed => Arc::new(OEmbedPictureResolver::new(client, api)),
    }
}

/// Final `/`-separated segment of a remote reference
pub fn remote_video_id(remote_ref: &str) -> &str {
    let without_query = remote_ref
        .split(['?', '#'])
        .next()
        .unwrap_or(remote_ref)
        .trim_end_matches('/');
    without_query.rsplit('/').next().unwrap_or(without_query)
}

/// Drop query string and fragment from a URL
pub fn strip_query(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => link
            .split(['?', '#'])
            .next()
            .unwrap_or(link)
            .to_string(),
    }
}

/// Picks the picture size nearest to a target width from the video resource
pub struct ApiPictureResolver {
    client: Arc<VimeoClient>,
    target_width: u32,
}

impl ApiPictureResolver {
    pub fn new(client: Arc<VimeoClient>, target_width: u32) -> Self {
        Self {
            client,
            target_width,
        }
    }
}

#[async_trait]
impl ThumbnailUrlResolver for ApiPictureResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Api
    }

    async fn resolve(&self, remote_ref: &str) -> ThumbnailResult<Option<String>> {
        let video_id = remote_video_id(remote_ref);
        if video_id.is_empty() {
            return Err(ThumbnailError::remote_api(
                remote_ref,
                "reference has no video id",
            ));
        }

        let video = self
            .client
            .get_video(video_id)
            .await
            .map_err(|e| ThumbnailError::remote_api(video_id, format!("{:#}", e)))?;

        let Some(size) = pick_nearest(video.picture_sizes(), self.target_width) else {
            debug!(video_id = %video_id, "Video has no pictures");
            return Ok(None);
        };

        debug!(
            video_id = %video_id,
            width = size.width,
            height = size.height,
            "Selected picture size"
        );
        Ok(Some(strip_query(&size.link)))
    }
}

/// Uses the oEmbed thumbnail, falling back to the API
pub struct OEmbedPictureResolver {
    client: Arc<VimeoClient>,
    fallback: ApiPictureResolver,
}

impl OEmbedPictureResolver {
    pub fn new(client: Arc<VimeoClient>, fallback: ApiPictureResolver) -> Self {
        Self { client, fallback }
    }
}

#[async_trait]
impl ThumbnailUrlResolver for OEmbedPictureResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::OEmbed
    }

    async fn resolve(&self, remote_ref: &str) -> ThumbnailResult<Option<String>> {
        match self.client.get_oembed(remote_ref).await {
            Ok(oembed) => {
                if let Some(thumbnail) = oembed.thumbnail_url.filter(|t| !t.is_empty()) {
                    return Ok(Some(strip_query(&thumbnail)));
                }
                info!(url = %remote_ref, "oEmbed has no thumbnail, asking the video API");
            }
            Err(e) => {
                info!(url = %remote_ref, error = %e, "oEmbed lookup failed, asking the video API");
            }
        }
        self.fallback.resolve(remote_ref).await
    }
}
