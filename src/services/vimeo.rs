//! Video API client
//!
//! Two endpoints are used:
//! - `GET {base}/videos/{id}` (bearer token) for the full video resource,
//!   including the `pictures.sizes` ladder
//! - `GET {oembed}?url={video_url}` (public) for the oEmbed summary
//!
//! Requests go through the shared rate limiter. Nothing is retried.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::rate_limiter::RateLimitedClient;

const ACCEPT_VERSION: &str = "application/vnd.vimeo.*+json;version=3.4";

/// Video API client
pub struct VimeoClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    oembed_url: String,
    api_token: String,
}

/// Video resource from `/videos/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VimeoVideo {
    /// e.g. `/videos/76979871`
    pub uri: String,
    pub name: Option<String>,
    pub link: Option<String>,
    pub duration: Option<u64>,
    pub pictures: Option<VimeoPictures>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VimeoPictures {
    #[serde(default)]
    pub sizes: Vec<VimeoPictureSize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VimeoPictureSize {
    pub width: u32,
    pub height: u32,
    pub link: String,
}

/// oEmbed summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VimeoOEmbed {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub video_id: Option<u64>,
}

impl VimeoVideo {
    /// Picture sizes, empty when the resource has none
    pub fn picture_sizes(&self) -> &[VimeoPictureSize] {
        self.pictures
            .as_ref()
            .map(|p| p.sizes.as_slice())
            .unwrap_or(&[])
    }
}

/// Pick the size whose width is nearest to `target_width`.
///
/// On a tie the larger picture wins.
pub fn pick_nearest(sizes: &[VimeoPictureSize], target_width: u32) -> Option<&VimeoPictureSize> {
    sizes.iter().min_by(|a, b| {
        let da = a.width.abs_diff(target_width);
        let db = b.width.abs_diff(target_width);
        da.cmp(&db).then(b.width.cmp(&a.width))
    })
}

impl VimeoClient {
    pub fn new(
        client: Arc<RateLimitedClient>,
        base_url: impl Into<String>,
        oembed_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            oembed_url: oembed_url.into(),
            api_token: api_token.into(),
        }
    }

    /// Check if the client has a token configured
    pub fn has_api_token(&self) -> bool {
        !self.api_token.trim().is_empty()
    }

    /// Get a video resource by id
    pub async fn get_video(&self, video_id: &str) -> Result<VimeoVideo> {
        if !self.has_api_token() {
            anyhow::bail!("Video API token not configured");
        }

        let url = format!("{}/videos/{}", self.base_url, video_id);
        debug!(video_id = %video_id, "Fetching video from API");

        let request = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header(ACCEPT, ACCEPT_VERSION);
        let response = self.client.send(request).await?;

        let status = response.status();
        if status.as_u16() == 429 {
            warn!(video_id = %video_id, "Video API rate limit hit");
            anyhow::bail!("Rate limited (429)");
        }
        if status.as_u16() == 401 {
            anyhow::bail!("Video API token is invalid");
        }
        if status.as_u16() == 404 {
            anyhow::bail!("Video not found");
        }
        if !status.is_success() {
            anyhow::bail!("Video API request failed with status: {}", status);
        }

        response
            .json::<VimeoVideo>()
            .await
            .context("Failed to parse video resource")
    }

    /// Get the oEmbed summary for a video page URL
    pub async fn get_oembed(&self, video_url: &str) -> Result<VimeoOEmbed> {
        debug!(url = %video_url, "Fetching oEmbed");

        let request = self
            .client
            .get(&self.oembed_url)
            .query(&[("url", video_url)]);
        let response = self.client.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("oEmbed request failed with status: {}", status);
        }

        response
            .json::<VimeoOEmbed>()
            .await
            .context("Failed to parse oEmbed response")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn ladder() -> Vec<VimeoPictureSize> {
        [(100, 75), (200, 150), (295, 166), (640, 360), (960, 540), (1280, 720)]
            .iter()
            .map(|(w, h)| VimeoPictureSize {
                width: *w,
                height: *h,
                link: format!("https://i.vimeocdn.com/video/42_{}x{}.jpg?r=pad", w, h),
            })
            .collect()
    }

    fn client(server: &MockServer, token: &str) -> VimeoClient {
        let http = RateLimitedClient::for_video_api(100, Duration::from_secs(5)).unwrap();
        VimeoClient::new(
            Arc::new(http),
            server.uri(),
            format!("{}/api/oembed.json", server.uri()),
            token,
        )
    }

    #[test]
    fn test_pick_nearest_standard_ladder() {
        let sizes = ladder();
        assert_eq!(pick_nearest(&sizes, 640).unwrap().width, 640);
        assert_eq!(pick_nearest(&sizes, 10_000).unwrap().width, 1280);
        assert_eq!(pick_nearest(&sizes, 0).unwrap().width, 100);
        assert!(pick_nearest(&[], 640).is_none());
    }

    #[test]
    fn test_pick_nearest_tie_prefers_larger() {
        let sizes = ladder();
        // 800 is 160 away from both 640 and 960
        assert_eq!(pick_nearest(&sizes, 800).unwrap().width, 960);
    }

    #[test]
    fn test_video_without_pictures() {
        let video: VimeoVideo =
            serde_json::from_str(r#"{"uri":"/videos/76979871","name":"Demo"}"#).unwrap();
        assert_eq!(video.uri, "/videos/76979871");
        assert!(video.picture_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_get_video_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/42"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uri": "/videos/42",
                "pictures": { "sizes": [{ "width": 640, "height": 360, "link": "https://cdn/42_640x360.jpg" }] }
            })))
            .mount(&server)
            .await;

        let video = client(&server, "secret").get_video("42").await.unwrap();
        assert_eq!(video.uri, "/videos/42");
        assert_eq!(video.picture_sizes().len(), 1);
    }

    #[tokio::test]
    async fn test_get_video_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/42"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server, "secret").get_video("42").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_get_video_without_token() {
        let server = MockServer::start().await;
        assert!(client(&server, " ").get_video("42").await.is_err());
    }

    #[tokio::test]
    async fn test_get_oembed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/oembed.json"))
            .and(query_param("url", "https://vimeo.com/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "video",
                "thumbnail_url": "https://cdn/42_295x166.jpg",
                "video_id": 42
            })))
            .mount(&server)
            .await;

        let oembed = client(&server, "secret")
            .get_oembed("https://vimeo.com/42")
            .await
            .unwrap();
        assert_eq!(oembed.thumbnail_url.as_deref(), Some("https://cdn/42_295x166.jpg"));
        assert_eq!(oembed.video_id, Some(42));
    }
}
