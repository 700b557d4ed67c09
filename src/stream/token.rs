//! Player token discovery
//!
//! The embed page hides a short-lived `_k` token somewhere in its markup,
//! and where it hides it changes between player releases. Discovery runs an
//! ordered list of strategies over the page and keeps the first hit.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use crate::config::RetryPolicy;
use crate::error::{ResolveError, Result};
use crate::http_client::{Fetch, FetchRequest};

const MIN_TOKEN_LEN: usize = 10;
const MIN_OBJECT_TOKEN_LEN: usize = 20;

static WINDOW_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.\w+\s*=\s*["']([a-zA-Z0-9_-]{10,})["']"#).unwrap()
});
static WINDOW_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.\w+\s*=\s*(\{[^}]+\});").unwrap());
static QUOTED_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([a-zA-Z0-9_-]{5,})["']"#).unwrap());

/// A discovery heuristic: page DOM and raw markup in, token candidate out.
type Strategy = fn(&Html, &str) -> Option<String>;

/// Strategies in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("meta", from_meta as Strategy),
    ("data-attr", from_data_attr as Strategy),
    ("script-nonce", from_script_nonce as Strategy),
    ("window-string", from_window_string as Strategy),
    ("window-object", from_window_object as Strategy),
    ("comment", from_comment as Strategy),
];

/// Run every strategy over `html` and return the first token found,
/// together with the name of the strategy that found it.
#[must_use]
pub fn find_token(html: &str) -> Option<(&'static str, String)> {
    let document = Html::parse_document(html);
    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(&document, html).map(|token| (*name, token)))
}

fn long_enough(value: &str, min: usize) -> Option<String> {
    (value.len() >= min).then(|| value.to_string())
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let element = document.select(&selector).next()?;
    long_enough(element.value().attr(attr)?, MIN_TOKEN_LEN)
}

fn from_meta(document: &Html, _html: &str) -> Option<String> {
    first_attr(document, r#"meta[name="_gg_fb"]"#, "content")
}

fn from_data_attr(document: &Html, _html: &str) -> Option<String> {
    first_attr(document, "[data-dpi]", "data-dpi")
}

fn from_script_nonce(document: &Html, _html: &str) -> Option<String> {
    let selector = Selector::parse("script[nonce]").ok()?;
    document
        .select(&selector)
        .filter_map(|script| script.value().attr("nonce"))
        .find_map(|nonce| long_enough(nonce, MIN_TOKEN_LEN))
}

fn from_window_string(_document: &Html, html: &str) -> Option<String> {
    WINDOW_STRING
        .captures_iter(html)
        .find_map(|cap| long_enough(cap.get(1)?.as_str(), MIN_TOKEN_LEN))
}

fn from_window_object(_document: &Html, html: &str) -> Option<String> {
    WINDOW_OBJECT.captures_iter(html).find_map(|cap| {
        let body = cap.get(1)?.as_str();
        let joined: String = QUOTED_PART
            .captures_iter(body)
            .filter_map(|part| part.get(1))
            .map(|part| part.as_str())
            .collect();
        long_enough(&joined, MIN_OBJECT_TOKEN_LEN)
    })
}

// Reserved: no player release has hidden the token in a comment yet.
fn from_comment(_document: &Html, _html: &str) -> Option<String> {
    None
}

/// Fetches embed pages and extracts their token, with bounded retry.
pub struct TokenDiscovery {
    fetcher: Arc<dyn Fetch>,
    referer: String,
    retry: RetryPolicy,
}

impl TokenDiscovery {
    /// `referer` is the catalog origin the embed page expects to be framed by.
    pub fn new(fetcher: Arc<dyn Fetch>, referer: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            referer: referer.into(),
            retry,
        }
    }

    /// Token of the page at `url`, or `None` once every attempt failed.
    #[instrument(skip(self))]
    pub async fn extract(&self, url: &str) -> Option<String> {
        for attempt in 0..self.retry.attempts {
            match self.attempt(url).await {
                Ok((strategy, token)) => {
                    debug!(strategy, attempt, "Token found");
                    return Some(token);
                }
                Err(e) => warn!(attempt, error = %e, "Token extraction failed"),
            }

            if self.retry.has_next(attempt) {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }
        None
    }

    async fn attempt(&self, url: &str) -> Result<(&'static str, String)> {
        let request = FetchRequest::get(url)
            .referer(&self.referer)
            .header("Accept", "text/html");
        let html = self.fetcher.fetch_text(&request).await?;
        find_token(&html).ok_or_else(|| ResolveError::Malformed("No token found".to_string()))
    }
}
