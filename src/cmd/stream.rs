use anyhow::Result;

use anistream::{ResolverConfig, StreamOrchestrator};

use super::output::print_envelope;

pub async fn cmd_stream(
    config: &ResolverConfig,
    episode_id: &str,
    server: &str,
    server_type: &str,
    pretty: bool,
) -> Result<bool> {
    let orchestrator = StreamOrchestrator::from_config(config)?;
    let result = orchestrator
        .resolve_stream(episode_id, server, server_type)
        .await;
    print_envelope(result, pretty)
}
