//! Server adapters: expose a [`Gateway`](crate::gateway::Gateway) over HTTP
//!
//! - **Axum router**: `axum::router()` (requires `server-adapters` feature)
//! - **Error masking**: upstream and internal failures render as fixed text
//!
//! ## Example (Axum)
//!
//! ```rust,ignore
//! use modelgate::server_adapters::axum::{RouterOptions, router};
//!
//! let app = router(gateway, RouterOptions::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#[cfg(feature = "server-adapters")]
pub mod axum;

/// Inbound header carrying the client's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Outbound header set on replayed responses.
pub const REPLAY_HEADER: &str = "x-idempotent-replay";

/// Inbound header identifying the caller for fingerprinting.
pub const ACTOR_HEADER: &str = "x-actor-id";
