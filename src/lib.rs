//! # modelgate - Provider-agnostic AI request gateway
//!
//! modelgate maps stable internal model identifiers onto interchangeable
//! backend providers and executes requests against them exactly once per
//! idempotency key.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Stable model ids**: callers name an [`InternalModelId`](types::InternalModelId); the
//!   provider behind it is configuration.
//! - **Deterministic failover**: providers are tried in declared priority order, skipping
//!   ones that are not configured.
//! - **No provider leakage**: provider names are hashed at load time, responses are
//!   normalized and upstream errors are masked.
//! - **Idempotency**: `Idempotency-Key` claims on a shared cache store, replay of completed
//!   responses and fingerprint dedup for unkeyed requests.
//! - **Retry**: per-provider retry with exponential backoff and jitter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new()
//!         .with_provider(
//!             ProviderEntry::new("primary")
//!                 .endpoint_env("PRIMARY_ENDPOINT")
//!                 .api_key_env("PRIMARY_API_KEY"),
//!         )
//!         .with_model(
//!             ModelEntry::new(InternalModelId::ModelFast, "Fast", 1, 16_000)
//!                 .capability(ModelCapability::TextGeneration)
//!                 .map_provider("primary", "small-chat-1"),
//!         )
//!         .resolve_env();
//!
//!     let gateway = Gateway::from_config(config)?;
//!     let reply = gateway
//!         .handle(
//!             InboundRequest::post("/v1/generate", ModelRequest::new(InternalModelId::ModelFast, "Hello"))
//!                 .with_idempotency_key(IdempotencyKey::generate().as_str()),
//!         )
//!         .await?;
//!     println!("{} (replayed: {})", reply.response.content, reply.replayed);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod idempotency;
pub mod registry;
pub mod retry;
pub mod selector;
pub mod server_adapters;
pub mod telemetry;
pub mod transformers;
pub mod transport;
pub mod types;

pub use error::GatewayError;

/// Commonly used items
pub mod prelude {
    pub use crate::cache::{CacheStore, MemoryCacheStore};
    pub use crate::config::{
        GatewayConfig, IdempotencySettings, ModelEntry, ProviderEntry, RetrySettings,
    };
    pub use crate::error::{GatewayError, UpstreamFailure};
    pub use crate::gateway::{Gateway, GatewayBuilder, GatewayReply, InboundRequest};
    pub use crate::idempotency::{
        IdempotencyGuard, IdempotencyKey, IdempotencyPolicy, IdempotencyStore,
        RequestFingerprint,
    };
    pub use crate::registry::{ProviderDirectory, Registry};
    pub use crate::selector::{PriorityOrderSelector, ProviderSelector};
    pub use crate::transport::{HttpTransport, ProviderTransport};
    pub use crate::types::*;
}
