//! Throttled HTTP client for the video API
//!
//! Every request waits for a permit before it is sent, so a long batch stays
//! under the configured request rate. Nothing is retried: a failed call is
//! reported to the caller as-is.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

/// Request rate of a [`RateLimitedClient`]
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    /// Requests allowed back to back before throttling kicks in
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst_size: 5,
        }
    }
}

impl RateLimitConfig {
    fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_second(rate).allow_burst(burst)
    }
}

pub struct RateLimitedClient {
    name: &'static str,
    client: Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimitedClient {
    pub fn new(name: &'static str, config: RateLimitConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("thumbnail-rebuilder/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            name,
            client,
            limiter: RateLimiter::direct(config.quota()),
        })
    }

    /// Client for the video API, with a burst of twice the rate
    pub fn for_video_api(requests_per_second: u32, timeout: Duration) -> Result<Self> {
        Self::new(
            "video_api",
            RateLimitConfig {
                requests_per_second,
                burst_size: requests_per_second.max(1).saturating_mul(2),
            },
            timeout,
        )
    }

    /// Start a GET request; nothing is sent until [`send`](Self::send)
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Wait for a permit, then send
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.wait_for_permit().await;

        let request = request.build().context("Invalid HTTP request")?;
        debug!(client = self.name, url = %request.url(), "Sending throttled request");

        self.client
            .execute(request)
            .await
            .context("HTTP request failed")
    }

    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_zero_rate_falls_back_to_minimum() {
        let client = RateLimitedClient::new(
            "test",
            RateLimitConfig {
                requests_per_second: 0,
                burst_size: 0,
            },
            Duration::from_secs(1),
        )
        .unwrap();
        // One permit is always available with the minimum quota
        client.wait_for_permit().await;
    }

    #[tokio::test]
    async fn test_send_keeps_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(query_param("url", "https://vimeo.com/1"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = RateLimitedClient::for_video_api(10, Duration::from_secs(5)).unwrap();
        let request = client
            .get(&format!("{}/lookup", server.uri()))
            .query(&[("url", "https://vimeo.com/1")])
            .header("Accept", "application/json");
        let response = client.send(request).await.unwrap();

        assert_eq!(response.status().as_u16(), 204);
    }
}
