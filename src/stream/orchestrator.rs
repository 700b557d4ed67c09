//! Stream resolution entry point
//!
//! Picks the requested server out of the episode's catalog, then either
//! hands back a mirror embed link (for servers that are mirrors themselves)
//! or runs the encrypted source decryptor. Dubbed streams without text
//! tracks borrow the captions of their sub counterpart.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::http_client::{Fetch, UpstreamClient};
use crate::servers::{
    episode_number, ServerCatalog, ServerCatalogResolver, ServerDescriptor, ServerType,
};
use crate::stream::decryptor::EncryptedSourceDecryptor;
use crate::stream::descriptor::StreamDescriptor;
use crate::stream::fallback::FallbackProvider;
use crate::stream::key::KeyCache;

/// Resolves episodes into playable stream descriptors.
pub struct StreamOrchestrator {
    servers: ServerCatalogResolver,
    decryptor: EncryptedSourceDecryptor,
    player_referer: String,
}

impl StreamOrchestrator {
    /// Orchestrator talking to the real upstreams.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let client = UpstreamClient::new(config)?;
        Ok(Self::with_fetcher(config, Arc::new(client)))
    }

    /// Orchestrator over any [`Fetch`] implementation.
    pub fn with_fetcher(config: &ResolverConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let keys = Arc::new(
            KeyCache::new(Arc::clone(&fetcher), &config.key_url)
                .with_ttl(config.key_ttl())
                .with_timeout(config.key_timeout()),
        );
        let decryptor = EncryptedSourceDecryptor::new(
            Arc::clone(&fetcher),
            keys,
            config.base(),
            config.token_retry(),
            config.decrypt_retry(),
        );

        Self {
            servers: ServerCatalogResolver::new(fetcher, config.base()),
            decryptor,
            player_referer: config.player_referer.clone(),
        }
    }

    /// Servers available for `episode_id`.
    #[instrument(skip(self))]
    pub async fn resolve_servers(&self, episode_id: &str) -> Result<ServerCatalog> {
        if episode_id.trim().is_empty() {
            return Err(ResolveError::validation("Episode ID is required"));
        }
        self.servers.resolve(episode_id).await
    }

    /// Resolve `episode_id` on the server named `server_name` for the
    /// given audio type (`sub`, `dub` or `raw`).
    #[instrument(skip(self))]
    pub async fn resolve_stream(
        &self,
        episode_id: &str,
        server_name: &str,
        server_type: &str,
    ) -> Result<StreamDescriptor> {
        if episode_id.trim().is_empty() || server_name.trim().is_empty() {
            return Err(ResolveError::validation(
                "ID and server parameters are required",
            ));
        }
        let server_type: ServerType = server_type.parse()?;

        let catalog = self.servers.resolve(episode_id).await?;
        let server = catalog.find(server_type, server_name).ok_or_else(|| {
            ResolveError::validation_with(
                "Invalid or server not found",
                serde_json::json!({ "server": server_name }),
            )
        })?;

        if let Some(provider) = FallbackProvider::by_name(&server.name) {
            debug!(provider = provider.name, "Embedded provider, passing link through");
            let link = provider.embed_url(episode_number(episode_id), server_type);
            return Ok(StreamDescriptor::embedded(
                episode_id,
                server_type,
                &server.name,
                link,
            ));
        }

        let mut stream = self
            .decryptor
            .decrypt(server, episode_id)
            .await
            .ok_or_else(|| ResolveError::not_found("Something went wrong while decryption"))?;

        if server_type == ServerType::Dub && !stream.has_text_tracks() {
            self.backfill_subtitles(&catalog, server, episode_id, &mut stream)
                .await;
        }

        stream.referer = Some(self.player_referer.clone());
        info!(
            used_fallback = stream.used_fallback,
            tracks = stream.tracks.len(),
            "Stream ready"
        );
        Ok(stream)
    }

    /// Append the sub counterpart's text tracks to a dub stream that has none.
    /// May fail silently: every failure here is logged and dropped.
    async fn backfill_subtitles(
        &self,
        catalog: &ServerCatalog,
        dub: &ServerDescriptor,
        episode_id: &str,
        stream: &mut StreamDescriptor,
    ) {
        let Some(sub) = catalog.sub_counterpart(dub) else {
            debug!(server = %dub.name, "No sub counterpart for subtitle backfill");
            return;
        };

        match self.decryptor.decrypt(sub, episode_id).await {
            Some(sub_stream) => {
                let before = stream.tracks.len();
                stream.tracks.extend(sub_stream.text_tracks().cloned());
                debug!(
                    added = stream.tracks.len() - before,
                    from = %sub.name,
                    "Subtitle backfill"
                );
            }
            None => warn!(
                episode_id,
                server = %sub.name,
                "Subtitle backfill failed, keeping dub tracks"
            ),
        }
    }
}
