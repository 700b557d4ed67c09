//! Mirror fallback chain
//!
//! Two embed mirrors can resolve the same episode without the player's
//! encryption. They are tried one after another, in an order chosen from
//! the server the client asked for; the first mirror that yields a file wins.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{ResolveError, Result};
use crate::http_client::{Fetch, FetchRequest};
use crate::servers::{episode_number, ServerType};

static DATA_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-id=["'](\d+)["']"#).unwrap());

/// An embed mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackProvider {
    pub name: &'static str,
    pub domain: &'static str,
}

/// Registered mirrors, in registration order.
pub const FALLBACK_PROVIDERS: [FallbackProvider; 2] = [
    FallbackProvider {
        name: "megaplay",
        domain: "megaplay.buzz",
    },
    FallbackProvider {
        name: "vidwish",
        domain: "vidwish.live",
    },
];

impl FallbackProvider {
    /// Registered mirror called `name`, if any.
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static FallbackProvider> {
        FALLBACK_PROVIDERS.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn origin(&self) -> String {
        format!("https://{}/", self.domain)
    }

    /// Embed page of an episode, e.g. `https://megaplay.buzz/stream/s-2/1/sub`.
    #[must_use]
    pub fn embed_url(&self, episode_number: &str, server_type: ServerType) -> String {
        format!(
            "https://{}/stream/s-2/{episode_number}/{server_type}",
            self.domain
        )
    }

    #[must_use]
    pub fn sources_url(&self, data_id: &str) -> String {
        format!("https://{}/stream/getSources?id={data_id}", self.domain)
    }
}

/// Mirrors in the order to try them for `server_name`: `hd-1` prefers the
/// first registered mirror, everything else the second; the rest follow in
/// registration order.
#[must_use]
pub fn prioritize(server_name: &str) -> Vec<&'static FallbackProvider> {
    let preferred = if server_name.eq_ignore_ascii_case("hd-1") {
        &FALLBACK_PROVIDERS[0]
    } else {
        &FALLBACK_PROVIDERS[1]
    };

    std::iter::once(preferred)
        .chain(FALLBACK_PROVIDERS.iter().filter(|p| *p != preferred))
        .collect()
}

/// Numeric `data-id` of the player element on a mirror embed page.
#[must_use]
pub fn extract_data_id(html: &str) -> Option<&str> {
    DATA_ID
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// File resolved through a mirror, with the payload it came from.
#[derive(Debug, Clone)]
pub struct FallbackHit {
    pub provider: &'static str,
    pub file: String,
    pub payload: Value,
}

/// Walks the mirrors until one resolves a file.
pub struct FallbackChain {
    fetcher: Arc<dyn Fetch>,
}

impl FallbackChain {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    /// Resolve a file for `episode_id`/`server_type` from the mirrors.
    ///
    /// Mirror failures are logged and skipped; only exhausting all of them
    /// is an error.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        episode_id: &str,
        server_type: ServerType,
        server_name: &str,
    ) -> Result<FallbackHit> {
        let episode = episode_number(episode_id);

        for provider in prioritize(server_name) {
            match self.try_provider(provider, episode, server_type).await {
                Ok(Some(hit)) => {
                    info!(provider = provider.name, "Mirror resolved stream");
                    return Ok(hit);
                }
                Ok(None) => debug!(provider = provider.name, "Mirror had no file"),
                Err(e) => warn!(provider = provider.name, error = %e, "Mirror failed"),
            }
        }

        Err(ResolveError::NotFound("All fallbacks failed".to_string()))
    }

    async fn try_provider(
        &self,
        provider: &'static FallbackProvider,
        episode: &str,
        server_type: ServerType,
    ) -> Result<Option<FallbackHit>> {
        let page = FetchRequest::get(provider.embed_url(episode, server_type))
            .referer(provider.origin());
        let html = self.fetcher.fetch_text(&page).await?;

        let Some(data_id) = extract_data_id(&html) else {
            return Ok(None);
        };

        let sources = FetchRequest::get(provider.sources_url(data_id))
            .xhr()
            .referer(provider.origin());
        let payload = self.fetcher.fetch_json(&sources).await?;

        let file = payload
            .pointer("/sources/file")
            .or_else(|| payload.get("file"))
            .and_then(Value::as_str)
            .filter(|file| !file.is_empty())
            .map(str::to_string);

        Ok(file.map(|file| FallbackHit {
            provider: provider.name,
            file,
            payload,
        }))
    }
}
