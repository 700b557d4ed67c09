//! Encrypted source resolution
//!
//! One decrypt attempt walks the catalog's ajax link to the player, discovers
//! the player token, fetches the encrypted sources and decrypts them with the
//! current key. When any step of that primary path fails the mirrors are
//! tried instead. Whole attempts are retried with linear backoff.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::RetryPolicy;
use crate::error::{ResolveError, Result};
use crate::http_client::{Fetch, FetchRequest};
use crate::servers::ServerDescriptor;
use crate::stream::cipher::decrypt_sources;
use crate::stream::descriptor::{SourceRecord, StreamDescriptor};
use crate::stream::fallback::FallbackChain;
use crate::stream::key::KeyCache;
use crate::stream::token::TokenDiscovery;

const TOKEN_QUERY: &str = "k=1&autoPlay=0&oa=0&asi=1";

static SOURCE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/([^/?]+)\?").unwrap());
static PLAYER_BASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?://[^/]+(?:/[^/]+){3})").unwrap());

/// Player location taken from the catalog's ajax `link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxLink {
    /// Scheme, host and the first three path segments.
    pub base_url: String,
    /// Path segment right before the query string.
    pub source_id: String,
}

impl AjaxLink {
    /// Split a link like `https://host/embed-2/v3/e-1/AbC123?k=1` into its
    /// player base and source id.
    pub fn parse(link: &str) -> Result<Self> {
        let source_id = SOURCE_ID
            .captures(link)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string());
        let base_url = PLAYER_BASE
            .captures(link)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string());

        match (base_url, source_id) {
            (Some(base_url), Some(source_id)) => Ok(Self {
                base_url,
                source_id,
            }),
            _ => Err(ResolveError::Malformed(format!(
                "Invalid ajax link format: {link}"
            ))),
        }
    }

    #[must_use]
    pub fn embed_url(&self) -> String {
        format!("{}/{}", self.base_url, self.source_id)
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}?{TOKEN_QUERY}", self.embed_url())
    }

    #[must_use]
    pub fn sources_url(&self, token: &str) -> String {
        format!(
            "{}/getSources?id={}&_k={}",
            self.base_url,
            self.source_id,
            urlencoding::encode(token)
        )
    }
}

/// Sources that won an attempt, with the payload they were read from.
struct Resolved {
    file: String,
    payload: Value,
    used_fallback: bool,
}

/// Turns a catalog server into a playable stream.
pub struct EncryptedSourceDecryptor {
    fetcher: Arc<dyn Fetch>,
    keys: Arc<KeyCache>,
    tokens: TokenDiscovery,
    fallbacks: FallbackChain,
    base_url: String,
    retry: RetryPolicy,
}

impl EncryptedSourceDecryptor {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        keys: Arc<KeyCache>,
        base_url: &str,
        token_retry: RetryPolicy,
        retry: RetryPolicy,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            tokens: TokenDiscovery::new(Arc::clone(&fetcher), format!("{base_url}/"), token_retry),
            fallbacks: FallbackChain::new(Arc::clone(&fetcher)),
            fetcher,
            keys,
            base_url,
            retry,
        }
    }

    /// Resolve `server` for `episode_id`, or `None` once every attempt failed.
    #[instrument(skip(self, server), fields(server = %server.name, server_id = %server.id))]
    pub async fn decrypt(
        &self,
        server: &ServerDescriptor,
        episode_id: &str,
    ) -> Option<StreamDescriptor> {
        for attempt in 0..self.retry.attempts {
            match self.attempt(server, episode_id).await {
                Ok(resolved) => {
                    info!(attempt, used_fallback = resolved.used_fallback, "Stream resolved");
                    return Some(StreamDescriptor::decrypted(
                        episode_id,
                        server.server_type,
                        &server.name,
                        resolved.file,
                        &resolved.payload,
                        resolved.used_fallback,
                    ));
                }
                Err(e) => warn!(
                    episode_id,
                    server = %server.name,
                    attempt,
                    error = %e,
                    "Decryption attempt failed"
                ),
            }

            if self.retry.has_next(attempt) {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }
        None
    }

    async fn attempt(&self, server: &ServerDescriptor, episode_id: &str) -> Result<Resolved> {
        let link = self.fetch_link(&server.id).await?;

        match self.primary(&link).await {
            Ok((sources, payload)) => {
                let file = first_file(&sources)?;
                Ok(Resolved {
                    file,
                    payload,
                    used_fallback: false,
                })
            }
            Err(e) => {
                warn!(error = %e, "Primary source failed, trying mirrors");
                let hit = self
                    .fallbacks
                    .resolve(episode_id, server.server_type, &server.name)
                    .await?;
                Ok(Resolved {
                    file: hit.file,
                    payload: hit.payload,
                    used_fallback: true,
                })
            }
        }
    }

    async fn fetch_link(&self, server_id: &str) -> Result<String> {
        let url = format!(
            "{}/ajax/v2/episode/sources?id={}",
            self.base_url,
            urlencoding::encode(server_id)
        );
        let request = FetchRequest::get(url)
            .referer(format!("{}/", self.base_url))
            .xhr();
        let data = self.fetcher.fetch_json(&request).await?;

        data.get("link")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::Malformed("Missing ajax link".to_string()))
    }

    /// Key, token, getSources, decrypt. Any error means the mirrors get a
    /// turn, including a key failure: the mirrors need no key.
    async fn primary(&self, link: &str) -> Result<(Vec<SourceRecord>, Value)> {
        let link = AjaxLink::parse(link)?;
        let key = self.keys.get_key().await?;

        let token = self
            .tokens
            .extract(&link.token_url())
            .await
            .ok_or_else(|| ResolveError::Upstream("Token extraction failed".to_string()))?;

        let request = FetchRequest::get(link.sources_url(&token))
            .xhr()
            .referer(link.embed_url());
        let payload = self.fetcher.fetch_json(&request).await?;

        let sources = match payload.get("sources") {
            Some(Value::String(encrypted)) if !encrypted.is_empty() => {
                debug!("Sources are encrypted");
                decrypt_sources(encrypted, &key)?
            }
            Some(list @ Value::Array(items)) if !items.is_empty() => {
                serde_json::from_value(list.clone())?
            }
            _ => {
                return Err(ResolveError::Malformed(
                    "Missing encrypted sources".to_string(),
                ))
            }
        };
        Ok((sources, payload))
    }
}

fn first_file(sources: &[SourceRecord]) -> Result<String> {
    sources
        .first()
        .map(|source| source.file.as_str())
        .filter(|file| !file.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ResolveError::Malformed("Invalid decrypted sources".to_string()))
}
