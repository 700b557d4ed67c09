//! `anistream` - Episode stream resolution
//!
//! # Features
//!
//! - **Server catalog**: sub/dub/raw servers of an episode, in upstream order
//! - **Source decryption**: player token discovery and AES-256-CBC sources
//! - **Mirror fallbacks**: embed mirrors when the player path fails
//! - **Subtitle backfill**: dubbed streams borrow captions from their sub server
//!
//! # Example
//!
//! ```rust,no_run
//! use anistream::{ResolverConfig, StreamOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResolverConfig::load(None)?;
//!     let orchestrator = StreamOrchestrator::from_config(&config)?;
//!     let stream = orchestrator
//!         .resolve_stream("one-piece-100?ep=2142", "hd-1", "sub")
//!         .await?;
//!     println!("{:?}", stream.file_url());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod servers;
pub mod stream;

pub use config::{ResolverConfig, RetryPolicy};
pub use error::{ErrorEnvelope, ResolveError, Result};
pub use fingerprint::BrowserProfile;
pub use http_client::{Fetch, FetchRequest, UpstreamClient};
pub use servers::{ServerCatalog, ServerCatalogResolver, ServerDescriptor, ServerType};
pub use stream::{StreamDescriptor, StreamOrchestrator};

/// Version of anistream
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
