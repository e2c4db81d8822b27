//! Transformers layer
//!
//! Converts generic [`ModelRequest`](crate::types::ModelRequest)s into provider
//! payloads and provider responses back into [`ModelResponse`](crate::types::ModelResponse)s.
//! [`ChatPayloadTransformer`] handles the chat-message shape most providers
//! accept; custom transformers plug in through the two traits.

pub mod request;
pub mod response;

pub use request::{PayloadMessage, ProviderPayload, RequestTransformer, transform_request};
pub use response::{ResponseTransformer, map_finish_reason, transform_response};

/// Default transformer pair for chat-style providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatPayloadTransformer;
