//! Request transformation
//!
//! Builds the provider payload: a `system` turn (when present) followed by
//! the `user` turn, with sampling defaults filled in.

use serde::Serialize;

use super::ChatPayloadTransformer;
use crate::error::GatewayError;
use crate::types::{ModelRequest, ProviderConfig};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Transform a generic request into a provider-specific JSON body.
pub trait RequestTransformer: Send + Sync {
    fn transform_request(
        &self,
        request: &ModelRequest,
        provider_model: &str,
        provider: &ProviderConfig,
    ) -> Result<serde_json::Value, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPayload {
    pub model: String,
    pub messages: Vec<PayloadMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<serde_json::Value>>,
}

/// Build the chat payload. `max_tokens` is capped at the provider's limit.
pub fn transform_request(
    request: &ModelRequest,
    provider_model: &str,
    provider: &ProviderConfig,
) -> ProviderPayload {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system_prompt.as_ref().filter(|s| !s.is_empty()) {
        messages.push(PayloadMessage {
            role: "system",
            content: system.clone(),
        });
    }
    messages.push(PayloadMessage {
        role: "user",
        content: request.prompt.clone(),
    });

    ProviderPayload {
        model: provider_model.to_string(),
        messages,
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: request
            .max_tokens
            .unwrap_or(DEFAULT_MAX_TOKENS)
            .min(provider.max_tokens),
        stream: request.stream.unwrap_or(false),
        functions: request.functions.clone(),
    }
}

impl RequestTransformer for ChatPayloadTransformer {
    fn transform_request(
        &self,
        request: &ModelRequest,
        provider_model: &str,
        provider: &ProviderConfig,
    ) -> Result<serde_json::Value, GatewayError> {
        let payload = transform_request(request, provider_model, provider);
        serde_json::to_value(payload)
            .map_err(|e| GatewayError::InvalidRequest(format!("cannot encode payload: {e}")))
    }
}
