//! Stream resolution for catalog episodes
//!
//! Layered leaf-first: key cache, token discovery, cipher and mirror
//! fallbacks feed the encrypted source decryptor, which the orchestrator
//! drives per request.

pub mod cipher;
pub mod decryptor;
pub mod descriptor;
pub mod fallback;
pub mod key;
pub mod orchestrator;
pub mod token;

pub use decryptor::{AjaxLink, EncryptedSourceDecryptor};
pub use descriptor::{StreamDescriptor, StreamSource, SubtitleTrack, TimeRange, TrackKind};
pub use fallback::{FallbackChain, FallbackProvider, FALLBACK_PROVIDERS};
pub use key::KeyCache;
pub use orchestrator::StreamOrchestrator;
pub use token::{find_token, TokenDiscovery};
