//! Error taxonomy for the resolution pipeline.
//!
//! Every failure maps onto one of three HTTP-style classes: validation
//! (400), not found (404) and upstream/internal (500). The JSON shape the
//! routing layer emits for them is [`ErrorEnvelope`].

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Bad or unknown input (unmatched server name, unknown type).
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// Every strategy was exhausted without producing a playable file.
    #[error("{0}")]
    NotFound(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

impl ResolveError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// HTTP status the routing layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound(_) => 404,
            _ => 500,
        }
    }

    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Render as the `{success: false, message, details?}` body.
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            success: false,
            message: self.to_string(),
            details: self.details().cloned(),
        }
    }
}

/// Failure body returned to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
