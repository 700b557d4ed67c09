//! Upstream HTTP client
//!
//! Every component of the pipeline reaches the network through the
//! [`Fetch`] trait. [`UpstreamClient`] is the reqwest-backed implementation:
//! - HTTP/2 when the server offers it, rustls TLS
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - Cookie store shared across the catalog and its players
//! - Browser default headers from [`BrowserProfile`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::fingerprint::BrowserProfile;

/// A single GET request with its per-request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn referer(self, value: impl Into<String>) -> Self {
        self.header("Referer", value)
    }

    /// Mark the request as script-originated, as the player's own XHRs are.
    #[must_use]
    pub fn xhr(self) -> Self {
        self.header("X-Requested-With", "XMLHttpRequest")
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of a request header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Outbound seam of the pipeline.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the body as text. Non-2xx statuses are errors.
    async fn fetch_text(&self, request: &FetchRequest) -> Result<String>;

    /// Fetch and parse the body as JSON.
    async fn fetch_json(&self, request: &FetchRequest) -> Result<Value> {
        let body = self.fetch_text(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            ResolveError::Malformed(format!("invalid JSON from {}: {e}", request.url))
        })
    }
}

/// reqwest-backed [`Fetch`] implementation
pub struct UpstreamClient {
    client: Client,
    default_timeout: Duration,
}

impl UpstreamClient {
    /// Build a client from the resolver configuration.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let profile = BrowserProfile::firefox(&config.user_agent);

        let client = Client::builder()
            // Keep connections alive for reuse across pipeline stages
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers()?)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            default_timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl Fetch for UpstreamClient {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch_text(&self, request: &FetchRequest) -> Result<String> {
        let mut builder = self
            .client
            .get(&request.url)
            .timeout(request.timeout.unwrap_or(self.default_timeout));
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(status = %status, version = ?response.version(), "Response received");

        if !status.is_success() {
            return Err(ResolveError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockFetch;
    use super::*;

    #[test]
    fn request_builder_collects_headers() {
        let request = FetchRequest::get("https://x.example/a")
            .referer("https://x.example/")
            .xhr()
            .timeout(Duration::from_secs(3));
        assert_eq!(request.header_value("referer"), Some("https://x.example/"));
        assert_eq!(request.header_value("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(request.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(UpstreamClient::new(&ResolverConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn fetch_json_rejects_invalid_body() {
        let fetch = MockFetch::new();
        fetch.respond("https://x.example/j", "<html>");
        let err = fetch
            .fetch_json(&FetchRequest::get("https://x.example/j"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Malformed(_)));
    }

    #[tokio::test]
    async fn mock_replays_queue_then_sticks() {
        let fetch = MockFetch::new();
        fetch.fail("https://x.example/k", 500).respond("https://x.example/k", "two");
        let request = FetchRequest::get("https://x.example/k");
        assert!(fetch.fetch_text(&request).await.is_err());
        assert_eq!(fetch.fetch_text(&request).await.unwrap(), "two");
        assert_eq!(fetch.fetch_text(&request).await.unwrap(), "two");
        assert_eq!(fetch.calls_to("https://x.example/k"), 3);
    }
}
