//! Server catalog for an episode.
//!
//! The catalog site lists, per episode, the servers able to play it in
//! three audio flavours (sub, dub, raw). Each list keeps upstream order and
//! the position inside it is what ties a dub server to its sub counterpart.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{ResolveError, Result};
use crate::http_client::{Fetch, FetchRequest};

/// Audio track flavour of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Sub,
    Dub,
    Raw,
}

impl ServerType {
    pub const ALL: [ServerType; 3] = [ServerType::Sub, ServerType::Dub, ServerType::Raw];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServerType::Sub => "sub",
            ServerType::Dub => "dub",
            ServerType::Raw => "raw",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sub" => Ok(ServerType::Sub),
            "dub" => Ok(ServerType::Dub),
            "raw" => Ok(ServerType::Raw),
            _ => Err(ResolveError::validation_with(
                "Type must be sub, dub, or raw",
                serde_json::json!({ "type": s }),
            )),
        }
    }
}

/// One playable server for an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Opaque upstream id, passed to the ajax sources endpoint.
    pub id: String,
    /// Lowercase label, e.g. `hd-1`.
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    /// Position within its type list.
    pub index: usize,
}

/// Servers of an episode, partitioned by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCatalog {
    pub sub: Vec<ServerDescriptor>,
    pub dub: Vec<ServerDescriptor>,
    pub raw: Vec<ServerDescriptor>,
}

impl ServerCatalog {
    #[must_use]
    pub fn list(&self, server_type: ServerType) -> &[ServerDescriptor] {
        match server_type {
            ServerType::Sub => &self.sub,
            ServerType::Dub => &self.dub,
            ServerType::Raw => &self.raw,
        }
    }

    fn list_mut(&mut self, server_type: ServerType) -> &mut Vec<ServerDescriptor> {
        match server_type {
            ServerType::Sub => &mut self.sub,
            ServerType::Dub => &mut self.dub,
            ServerType::Raw => &mut self.raw,
        }
    }

    /// First server of `server_type` whose name matches exactly.
    #[must_use]
    pub fn find(&self, server_type: ServerType, name: &str) -> Option<&ServerDescriptor> {
        self.list(server_type).iter().find(|s| s.name == name)
    }

    /// Sub server sharing either the name or the index of `server`.
    #[must_use]
    pub fn sub_counterpart(&self, server: &ServerDescriptor) -> Option<&ServerDescriptor> {
        self.sub
            .iter()
            .find(|s| s.name == server.name || s.index == server.index)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub.is_empty() && self.dub.is_empty() && self.raw.is_empty()
    }

    /// Partition servers-listing markup into the three type lists.
    pub fn from_markup(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let mut catalog = Self::default();

        for server_type in ServerType::ALL {
            let selector = Selector::parse(&format!(
                ".ps_-block.ps_-block-sub.servers-{server_type} .ps__-list .server-item"
            ))
            .map_err(|e| ResolveError::Malformed(format!("{e:?}")))?;

            let list = catalog.list_mut(server_type);
            for item in document.select(&selector) {
                let Some(id) = item.value().attr("data-id").filter(|id| !id.is_empty()) else {
                    continue;
                };
                let index = list.len();
                list.push(ServerDescriptor {
                    id: id.to_string(),
                    name: item.text().collect::<String>().trim().to_lowercase(),
                    server_type,
                    index,
                });
            }
        }

        Ok(catalog)
    }
}

/// Episode number carried by an episode id: whatever follows the last
/// `ep=` marker, or the whole id when there is none.
#[must_use]
pub fn episode_number(episode_id: &str) -> &str {
    episode_id.rsplit("ep=").next().unwrap_or(episode_id)
}

/// Fetches the servers listing of an episode.
pub struct ServerCatalogResolver {
    fetcher: Arc<dyn Fetch>,
    base_url: String,
}

impl ServerCatalogResolver {
    pub fn new(fetcher: Arc<dyn Fetch>, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn listing_url(&self, episode_id: &str) -> String {
        format!(
            "{}/ajax/v2/episode/servers?episodeId={}",
            self.base_url,
            urlencoding::encode(episode_number(episode_id))
        )
    }

    /// Fetch and partition the servers of `episode_id`.
    ///
    /// An episode without servers yields an empty catalog, not an error.
    #[instrument(skip(self))]
    pub async fn resolve(&self, episode_id: &str) -> Result<ServerCatalog> {
        let request = FetchRequest::get(self.listing_url(episode_id))
            .referer(format!("{}/", self.base_url))
            .xhr();
        let body = self.fetcher.fetch_text(&request).await?;

        let catalog = ServerCatalog::from_markup(&listing_markup(&body))?;
        debug!(
            sub = catalog.sub.len(),
            dub = catalog.dub.len(),
            raw = catalog.raw.len(),
            "Servers listed"
        );
        Ok(catalog)
    }
}

/// The listing answers either bare markup or `{"status": true, "html": "..."}`.
fn listing_markup(body: &str) -> std::borrow::Cow<'_, str> {
    if body.trim_start().starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            if let Some(Value::String(html)) = map.get("html") {
                return std::borrow::Cow::Owned(html.clone());
            }
        }
    }
    std::borrow::Cow::Borrowed(body)
}
