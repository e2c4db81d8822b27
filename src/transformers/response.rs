//! Response transformation
//!
//! Two provider shapes are understood:
//! - chat style: `choices[0].message.content`, `choices[0].finish_reason`,
//!   `usage.{prompt,completion,total}_tokens`
//! - block style: `content[0].text`, `stop_reason`, `usage.{input,output}_tokens`
//!
//! Only content, usage and the finish reason are carried over. The provider's
//! own `model`, `id` and any other fields are discarded.

use std::collections::HashMap;

use serde_json::Value;

use super::ChatPayloadTransformer;
use crate::error::GatewayError;
use crate::types::{FinishReason, InternalModelId, ModelResponse, Usage};

/// Transform provider-specific response JSON into a [`ModelResponse`].
pub trait ResponseTransformer: Send + Sync {
    fn transform_response(
        &self,
        raw: &Value,
        requested: InternalModelId,
    ) -> Result<ModelResponse, GatewayError>;
}

impl ResponseTransformer for ChatPayloadTransformer {
    fn transform_response(
        &self,
        raw: &Value,
        requested: InternalModelId,
    ) -> Result<ModelResponse, GatewayError> {
        Ok(transform_response(raw, requested))
    }
}

/// Normalize a provider response. `model` is always `requested`.
pub fn transform_response(raw: &Value, requested: InternalModelId) -> ModelResponse {
    let content = raw
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| raw.pointer("/content/0/text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let reason = raw
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str)
        .or_else(|| raw.get("stop_reason").and_then(Value::as_str))
        .unwrap_or("stop");

    let mut metadata = HashMap::new();
    metadata.insert(
        "timestamp".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );

    ModelResponse {
        content,
        usage: extract_usage(raw.get("usage")),
        model: requested,
        finish_reason: map_finish_reason(reason),
        metadata,
    }
}

fn extract_usage(usage: Option<&Value>) -> Usage {
    let Some(usage) = usage else {
        return Usage::default();
    };
    let field = |names: &[&str]| -> Option<u32> {
        names
            .iter()
            .find_map(|name| usage.get(*name).and_then(Value::as_u64))
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    };

    let prompt_tokens = field(&["prompt_tokens", "input_tokens"]).unwrap_or(0);
    let completion_tokens = field(&["completion_tokens", "output_tokens"]).unwrap_or(0);
    let total_tokens = field(&["total_tokens"])
        .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens));

    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
    }
}

/// Map a provider finish reason onto [`FinishReason`]. Unknown values map to `Stop`.
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" | "end_turn" => FinishReason::Stop,
        "length" | "max_tokens" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::FunctionCall,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}
