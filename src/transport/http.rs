//! reqwest-backed transport

use async_trait::async_trait;
use serde_json::Value;

use super::{ProviderTransport, provider_headers};
use crate::error::{GatewayError, UpstreamFailure};
use crate::types::ProviderConfig;

/// POSTs payloads to `provider.endpoint` over a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS roots, pools).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn upstream(cause: UpstreamFailure) -> GatewayError {
        GatewayError::ProviderError { attempts: 1, cause }
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, provider: &ProviderConfig, payload: &Value) -> Result<Value, GatewayError> {
        let headers = provider_headers(provider)?;

        let response = self
            .client
            .post(provider.endpoint.clone())
            .headers(headers)
            .timeout(provider.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::ProviderTimeout {
                        timeout: provider.timeout,
                    }
                } else {
                    Self::upstream(UpstreamFailure::Transport)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies are dropped unread; they may echo provider details.
            tracing::debug!(
                provider = provider.provider_id.short(),
                status = status.as_u16(),
                "provider returned error status"
            );
            return Err(Self::upstream(UpstreamFailure::Status(status.as_u16())));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::ProviderTimeout {
                    timeout: provider.timeout,
                }
            } else {
                Self::upstream(UpstreamFailure::InvalidResponse)
            }
        })
    }
}
