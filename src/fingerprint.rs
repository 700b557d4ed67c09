//! Browser header profile
//!
//! The catalog and its mirrors serve different markup (or nothing) to
//! clients that do not look like a desktop browser, so every upstream
//! request carries the same Firefox-on-Linux header set.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::error::{ResolveError, Result};

/// Default headers sent with every upstream request
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub upgrade_insecure_requests: String,
}

impl BrowserProfile {
    /// Firefox profile with the given User-Agent string.
    #[must_use]
    pub fn firefox(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            upgrade_insecure_requests: "1".to_string(),
        }
    }

    /// Convert the profile into a reqwest header map.
    ///
    /// Accept-Encoding is left to reqwest so it can decompress transparently.
    pub fn to_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("User-Agent", &self.user_agent)?);
        headers.insert(ACCEPT, header_value("Accept", &self.accept)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value("Accept-Language", &self.accept_language)?,
        );
        headers.insert(
            "Upgrade-Insecure-Requests",
            header_value("Upgrade-Insecure-Requests", &self.upgrade_insecure_requests)?,
        );
        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ResolveError::Config(format!("invalid {name} header value")))
}
