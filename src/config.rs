//! Resolver configuration loaded from `~/.config/anistream/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://hianime.to";
pub const DEFAULT_KEY_URL: &str =
    "https://raw.githubusercontent.com/ryanwtf88/megacloud-keys/refs/heads/master/key.txt";
pub const DEFAULT_PLAYER_REFERER: &str = "https://megacloud.tv";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0";

/// Everything the pipeline needs to know about its upstreams.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Catalog site origin (servers listing, ajax sources, token Referer).
    pub base_url: String,
    /// Plain-text endpoint serving the current decryption key.
    pub key_url: String,
    /// Referer clients must send when playing a resolved file.
    pub player_referer: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub key_timeout_secs: u64,
    /// Freshness window of the cached decryption key.
    pub key_ttl_secs: u64,
    /// Extra decrypt attempts after the first one.
    pub decrypt_retries: u32,
    pub decrypt_backoff_secs: u64,
    /// Total token page fetches before giving up.
    pub token_attempts: u32,
    pub token_backoff_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            key_url: DEFAULT_KEY_URL.to_string(),
            player_referer: DEFAULT_PLAYER_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 15,
            key_timeout_secs: 10,
            key_ttl_secs: 3600,
            decrypt_retries: 2,
            decrypt_backoff_secs: 2,
            token_attempts: 3,
            token_backoff_secs: 1,
        }
    }
}

impl ResolverConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("ANISTREAM_BASE_URL") {
            self.base_url = value;
        }
        if let Ok(value) = std::env::var("ANISTREAM_KEY_URL") {
            self.key_url = value;
        }
        if let Ok(value) = std::env::var("ANISTREAM_REFERER") {
            self.player_referer = value;
        }
    }

    /// Reject URLs that would only fail later, mid-resolution.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("base_url", &self.base_url),
            ("key_url", &self.key_url),
            ("player_referer", &self.player_referer),
        ] {
            let parsed = url::Url::parse(value)
                .with_context(|| format!("{field} is not a valid URL: {value}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("{field} must be an http(s) URL: {value}");
            }
        }
        if self.token_attempts == 0 {
            bail!("token_attempts must be at least 1");
        }
        Ok(())
    }

    /// Catalog origin without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn key_timeout(&self) -> Duration {
        Duration::from_secs(self.key_timeout_secs)
    }

    pub fn key_ttl(&self) -> Duration {
        Duration::from_secs(self.key_ttl_secs)
    }

    pub fn decrypt_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.decrypt_retries.saturating_add(1),
            Duration::from_secs(self.decrypt_backoff_secs),
        )
    }

    pub fn token_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.token_attempts,
            Duration::from_secs(self.token_backoff_secs),
        )
    }
}

/// Bounded retry with linear backoff: the wait after attempt `n` (zero
/// based) is `(n + 1) * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub step: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, step: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            step,
        }
    }

    /// Saturates at `Duration::MAX` instead of overflowing.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step
            .checked_mul(attempt.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }

    /// Whether another attempt follows `attempt`.
    #[must_use]
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.attempts
    }
}

/// Return the path to the default config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anistream")
        .join("config.toml")
}
