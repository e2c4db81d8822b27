use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProviderId;
use crate::error::GatewayError;

/// Stable, provider-independent model identifier.
///
/// These never change when the providers behind them change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalModelId {
    /// Fast inference, low cost
    ModelFast,
    /// Balance of speed and quality
    ModelBalanced,
    /// High-quality reasoning
    ModelAdvanced,
    /// Multimodal (vision)
    ModelVision,
    /// Top-tier capabilities
    ModelUltra,
    /// Code generation specialist
    ModelCode,
    /// Text embeddings
    ModelEmbed,
    /// Audio transcription
    ModelAudio,
    /// Image generation
    ModelImage,
}

impl InternalModelId {
    pub const ALL: [Self; 9] = [
        Self::ModelFast,
        Self::ModelBalanced,
        Self::ModelAdvanced,
        Self::ModelVision,
        Self::ModelUltra,
        Self::ModelCode,
        Self::ModelEmbed,
        Self::ModelAudio,
        Self::ModelImage,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ModelFast => "model_fast",
            Self::ModelBalanced => "model_balanced",
            Self::ModelAdvanced => "model_advanced",
            Self::ModelVision => "model_vision",
            Self::ModelUltra => "model_ultra",
            Self::ModelCode => "model_code",
            Self::ModelEmbed => "model_embed",
            Self::ModelAudio => "model_audio",
            Self::ModelImage => "model_image",
        }
    }
}

impl std::fmt::Display for InternalModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InternalModelId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| GatewayError::NotFound {
                model: s.to_string(),
            })
    }
}

/// Capability tags (generic, no provider names)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCapability {
    TextGeneration,
    CodeGeneration,
    Vision,
    Audio,
    Embedding,
    ImageGeneration,
    Streaming,
    FunctionCalling,
}

/// Relative cost of a model, 1 (cheapest) to 5 (most expensive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CostTier(u8);

impl CostTier {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(tier: u8) -> Result<Self, GatewayError> {
        if (Self::MIN..=Self::MAX).contains(&tier) {
            Ok(Self(tier))
        } else {
            Err(GatewayError::Config(format!(
                "cost tier must be between {} and {}, got {tier}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Model configuration, decoupled from any provider.
///
/// Built only by [`Registry::load`](crate::registry::Registry::load), which
/// guarantees `provider_mapping` is non-empty and `display_name` names no provider.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub internal_id: InternalModelId,
    pub display_name: String,
    pub capabilities: BTreeSet<ModelCapability>,
    pub cost_tier: CostTier,
    pub max_context_length: u32,
    pub supports_streaming: bool,
    /// Provider priority order: `(provider id, provider model name)`.
    pub provider_mapping: Vec<(ProviderId, String)>,
}

impl ModelConfig {
    pub fn has_capability(&self, capability: ModelCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Public view of this model, safe to hand to end users.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.internal_id,
            display_name: self.display_name.clone(),
            capabilities: self.capabilities.iter().copied().collect(),
            cost_tier: self.cost_tier,
            max_context_length: self.max_context_length,
            supports_streaming: self.supports_streaming,
        }
    }
}

/// Provider-free model listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub id: InternalModelId,
    pub display_name: String,
    pub capabilities: Vec<ModelCapability>,
    pub cost_tier: CostTier,
    pub max_context_length: u32,
    pub supports_streaming: bool,
}
