//! `anistream` CLI - resolve episode servers and streams as JSON

mod cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anistream::ResolverConfig;

#[derive(Parser)]
#[command(name = "anistream")]
#[command(about = "Resolve anime episode servers and playable streams")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/anistream/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sub/dub/raw servers of an episode
    Servers {
        /// Episode id, e.g. one-piece-100?ep=2142
        episode_id: String,
    },

    /// Resolve a playable stream for an episode
    Stream {
        /// Episode id, e.g. one-piece-100?ep=2142
        episode_id: String,

        /// Server name from the servers listing (hd-1, hd-2, megaplay, ...)
        #[arg(short, long)]
        server: String,

        /// Audio type: sub, dub or raw
        #[arg(short = 't', long = "type", default_value = "sub")]
        server_type: String,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stderr keeps stdout pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ResolverConfig::load(cli.config.as_deref())?;

    let ok = match cli.command {
        Commands::Servers { episode_id } => {
            cmd::servers::cmd_servers(&config, &episode_id, cli.pretty).await?
        }
        Commands::Stream {
            episode_id,
            server,
            server_type,
        } => {
            cmd::stream::cmd_stream(&config, &episode_id, &server, &server_type, cli.pretty)
                .await?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
