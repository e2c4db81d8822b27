//! Core data types shared across the gateway.
//!
//! Nothing in this module names a concrete provider: models are addressed by
//! [`InternalModelId`] and providers by their hashed [`ProviderId`].

mod model;
mod provider;
mod request;
mod response;

pub use model::{CostTier, InternalModelId, ModelCapability, ModelConfig, ModelSummary};
pub use provider::{AuthType, ProviderConfig, ProviderId};
pub use request::ModelRequest;
pub use response::{FinishReason, ModelResponse, Usage};
