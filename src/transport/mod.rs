//! Provider transport
//!
//! [`ProviderTransport`] sends one JSON payload to one provider and returns the
//! parsed JSON answer. Retries, timeouts and failover live above this layer.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::ProviderConfig;

pub mod headers;
pub mod http;

pub use headers::{API_KEY_HEADER, HttpHeaderBuilder, provider_headers};
pub use http::HttpTransport;

/// A single attempt against a provider endpoint.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, provider: &ProviderConfig, payload: &Value) -> Result<Value, GatewayError>;
}
