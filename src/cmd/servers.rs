use anyhow::Result;

use anistream::{ResolverConfig, StreamOrchestrator};

use super::output::print_envelope;

pub async fn cmd_servers(config: &ResolverConfig, episode_id: &str, pretty: bool) -> Result<bool> {
    let orchestrator = StreamOrchestrator::from_config(config)?;
    let result = orchestrator.resolve_servers(episode_id).await;
    print_envelope(result, pretty)
}
