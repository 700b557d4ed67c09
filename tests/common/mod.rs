//! Shared fixtures: a scripted upstream and an OpenSSL-style encryptor.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anistream::{Fetch, FetchRequest, ResolveError, ResolverConfig, StreamOrchestrator};
use async_trait::async_trait;

mod salted;
pub use salted::salted_export;

pub const BASE: &str = "https://catalog.test";
pub const KEY_URL: &str = "https://keys.test/key.txt";
pub const KEY: &str = "integration-key-2025";
pub const EPISODE: &str = "frieren-18542?ep=107257";
pub const LISTING: &str = "https://catalog.test/ajax/v2/episode/servers?episodeId=107257";

/// Upstream that answers from a per-URL script; the last reply repeats.
#[derive(Default)]
pub struct ScriptedUpstream {
    routes: Mutex<HashMap<String, VecDeque<Result<String, u16>>>>,
    log: Mutex<Vec<FetchRequest>>,
}

impl ScriptedUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn body(&self, url: &str, body: impl Into<String>) {
        self.push(url, Ok(body.into()));
    }

    pub fn status(&self, url: &str, status: u16) {
        self.push(url, Err(status));
    }

    fn push(&self, url: &str, reply: Result<String, u16>) {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|r| r.url == url).count()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for ScriptedUpstream {
    async fn fetch_text(&self, request: &FetchRequest) -> anistream::Result<String> {
        self.log.lock().unwrap().push(request.clone());
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&request.url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply.unwrap_or(Err(404)) {
            Ok(body) => Ok(body),
            Err(status) => Err(ResolveError::Status {
                url: request.url.clone(),
                status,
            }),
        }
    }
}

/// Config pointing at the scripted hosts, with every backoff at zero.
pub fn config() -> ResolverConfig {
    ResolverConfig {
        base_url: BASE.to_string(),
        key_url: KEY_URL.to_string(),
        decrypt_backoff_secs: 0,
        token_backoff_secs: 0,
        ..ResolverConfig::default()
    }
}

pub fn orchestrator(upstream: &Arc<ScriptedUpstream>) -> StreamOrchestrator {
    StreamOrchestrator::with_fetcher(&config(), upstream.clone())
}

fn server_block(kind: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(id, name)| {
            format!(
                r#"<div class="item server-item" data-type="{kind}" data-id="{id}"><a class="btn">{name}</a></div>"#
            )
        })
        .collect();
    format!(
        r#"<div class="ps_-block ps_-block-sub servers-{kind}"><div class="ps__-list">{items}</div></div>"#
    )
}

/// Servers-listing JSON with sub and dub blocks of `(data-id, name)` items.
pub fn listing(sub: &[(&str, &str)], dub: &[(&str, &str)]) -> String {
    let html = format!("{}{}", server_block("sub", sub), server_block("dub", dub));
    serde_json::json!({ "status": true, "html": html }).to_string()
}

pub fn ajax_url(server_id: &str) -> String {
    format!("{BASE}/ajax/v2/episode/sources?id={server_id}")
}

pub fn token_url(source_id: &str) -> String {
    format!("https://player.test/embed-2/v3/e-1/{source_id}?k=1&autoPlay=0&oa=0&asi=1")
}

pub fn sources_url(source_id: &str, token: &str) -> String {
    format!("https://player.test/embed-2/v3/e-1/getSources?id={source_id}&_k={token}")
}

/// Script the player path of `server_id` up to (not including) getSources.
pub fn script_player(upstream: &ScriptedUpstream, server_id: &str, source_id: &str, token: &str) {
    upstream.body(
        &ajax_url(server_id),
        format!(r#"{{"type":"iframe","link":"https://player.test/embed-2/v3/e-1/{source_id}?k=1","server":4}}"#),
    );
    upstream.body(
        &token_url(source_id),
        format!(r#"<html><head><meta name="_gg_fb" content="{token}"></head><body></body></html>"#),
    );
}
