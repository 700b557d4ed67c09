//! Decryption key cache
//!
//! The player rotates the passphrase of its source payloads; a third party
//! republishes it as plain text. The key is cached for an hour and a stale
//! copy is preferred over no key at all when the refresh fails.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, Result};
use crate::http_client::{Fetch, FetchRequest};

/// Last key fetched from the key endpoint.
#[derive(Clone)]
pub struct CachedKey {
    value: String,
    fetched_at: DateTime<Utc>,
}

impl CachedKey {
    fn new(value: String) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .map(|age| age < ttl)
            // Negative age: the clock went backwards, treat as fresh
            .unwrap_or(true)
    }
}

impl fmt::Debug for CachedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKey")
            .field("value", &"<redacted>")
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Process-wide decryption key provider.
///
/// Shared by `Arc`. The slot lock is held across a refresh, so concurrent
/// callers that find the key expired wait for one fetch instead of racing.
pub struct KeyCache {
    fetcher: Arc<dyn Fetch>,
    url: String,
    ttl: Duration,
    timeout: Duration,
    slot: Mutex<Option<CachedKey>>,
}

impl KeyCache {
    pub fn new(fetcher: Arc<dyn Fetch>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(10),
            slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current key: cached while fresh, refreshed otherwise, stale on
    /// refresh failure. Fails only when no key was ever obtained.
    pub async fn get_key(&self) -> Result<String> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(self.ttl) {
                return Ok(cached.value.clone());
            }
            debug!(fetched_at = %cached.fetched_at, "Decryption key expired");
        }

        match self.fetch().await {
            Ok(value) => {
                info!("Decryption key refreshed");
                let key = CachedKey::new(value);
                let value = key.value.clone();
                *slot = Some(key);
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(stale) => {
                    warn!(error = %e, fetched_at = %stale.fetched_at, "Key refresh failed, using stale key");
                    Ok(stale.value.clone())
                }
                None => {
                    warn!(error = %e, "Key refresh failed and no key is cached");
                    Err(ResolveError::Upstream(
                        "Failed to fetch decryption key".to_string(),
                    ))
                }
            },
        }
    }

    /// Snapshot of the cached key, if any.
    pub async fn cached(&self) -> Option<CachedKey> {
        self.slot.lock().await.clone()
    }

    async fn fetch(&self) -> Result<String> {
        let request = FetchRequest::get(&self.url).timeout(self.timeout);
        let body = self.fetcher.fetch_text(&request).await?;
        let value = body.trim();
        if value.is_empty() {
            return Err(ResolveError::Malformed("empty decryption key".to_string()));
        }
        Ok(value.to_string())
    }
}
