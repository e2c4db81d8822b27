//! Error Handling Module
//!
//! A single error type, [`GatewayError`], covers configuration, client input,
//! upstream and cache failures. Every variant carries a stable machine-readable
//! [`kind`](GatewayError::kind) and an HTTP [`status_code`](GatewayError::status_code).
//!
//! User-visible text comes from [`GatewayError::user_message`], which never
//! includes provider identity, provider model names or raw upstream bodies.
//!
//! # Example
//!
//! ```rust
//! use modelgate::error::GatewayError;
//!
//! let error = GatewayError::InvalidIdempotencyKey;
//! assert_eq!(error.kind(), "INVALID_IDEMPOTENCY_KEY");
//! assert_eq!(error.status_code(), 400);
//! assert!(!error.is_retryable());
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::types::InternalModelId;

/// Why an upstream call failed, without any provider-identifying detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// The attempt did not finish within the provider timeout.
    Timeout,
    /// The provider answered with a non-success HTTP status.
    Status(u16),
    /// Connection-level failure (DNS, TLS, reset, ...).
    Transport,
    /// The provider answered 2xx but the body was not usable JSON.
    InvalidResponse,
}

impl UpstreamFailure {
    /// Whether another attempt against the same provider may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport | Self::InvalidResponse => true,
            Self::Status(code) => matches!(*code, 408 | 429 | 500..=599),
        }
    }
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Transport => write!(f, "transport failure"),
            Self::InvalidResponse => write!(f, "invalid response body"),
        }
    }
}

/// Gateway error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Fatal at startup: no usable providers/models, or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown internal model identifier.
    #[error("Model not found: {model}")]
    NotFound { model: String },

    /// The model exists but no provider backing it is configured.
    #[error("No provider available for model: {model}")]
    NoProviderAvailable { model: InternalModelId },

    /// Request body failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// `Idempotency-Key` header present but not a UUID v4.
    #[error("Invalid idempotency key")]
    InvalidIdempotencyKey,

    /// Endpoint requires an `Idempotency-Key` header and none was sent.
    #[error("Idempotency key required")]
    IdempotencyKeyRequired,

    /// Another request holding the same key has not finished yet.
    #[error("A request with this idempotency key is still in flight")]
    RequestInFlight,

    /// A single attempt exceeded the provider timeout.
    #[error("Upstream timed out after {timeout:?}")]
    ProviderTimeout { timeout: Duration },

    /// Upstream failed after local retries were exhausted.
    #[error("Upstream unavailable after {attempts} attempt(s): {cause}")]
    ProviderError { attempts: u32, cause: UpstreamFailure },

    /// Shared cache store could not be reached.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl GatewayError {
    /// Stable error kind, safe to expose to callers.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::NotFound { .. } => "MODEL_NOT_FOUND",
            Self::NoProviderAvailable { .. } => "NO_PROVIDER_AVAILABLE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
            Self::IdempotencyKeyRequired => "IDEMPOTENCY_KEY_REQUIRED",
            Self::RequestInFlight => "IDEMPOTENCY_REQUEST_IN_FLIGHT",
            Self::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
            Self::ProviderError { .. } => "PROVIDER_ERROR",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
        }
    }

    /// HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::NotFound { .. } => 404,
            Self::NoProviderAvailable { .. } => 503,
            Self::InvalidRequest(_) | Self::InvalidIdempotencyKey | Self::IdempotencyKeyRequired => {
                400
            }
            Self::RequestInFlight => 409,
            Self::ProviderTimeout { .. } => 504,
            Self::ProviderError { .. } => 502,
            Self::CacheUnavailable(_) => 503,
        }
    }

    /// Check if the error should be retried against the same provider.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderTimeout { .. } => true,
            Self::ProviderError { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    /// Whether the error was caused by client input rather than the gateway or upstream.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidRequest(_)
                | Self::InvalidIdempotencyKey
                | Self::IdempotencyKeyRequired
                | Self::RequestInFlight
        )
    }

    /// Message for end users. Upstream and internal failures collapse into
    /// fixed text; client errors keep their own description.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "The gateway is not configured correctly".to_string(),
            Self::ProviderTimeout { .. } | Self::ProviderError { .. } => {
                "Upstream unavailable, please retry later".to_string()
            }
            Self::CacheUnavailable(_) => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort_unstable();
        Self::InvalidRequest(format!("invalid field(s): {}", fields.join(", ")))
    }
}
