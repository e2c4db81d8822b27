use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::InternalModelId;

/// Normalized reason why a generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Completed naturally (`stop`, `end_turn`).
    #[default]
    Stop,
    /// Hit the token limit (`length`, `max_tokens`).
    Length,
    /// Model requested a function/tool call (`tool_calls`, `function_call`).
    FunctionCall,
    /// Output was filtered by the provider's policy.
    ContentFilter,
}

/// Token accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Provider-agnostic model response.
///
/// `model` is always the requested [`InternalModelId`], never a provider model name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    pub content: String,
    pub usage: Usage,
    pub model: InternalModelId,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}
