//! Gateway configuration
//!
//! [`GatewayConfig`] is the resolved configuration object the registry is
//! built from. It can be deserialized from JSON or assembled in code. Provider
//! endpoints and credentials may be given inline or as the name of an
//! environment variable (`endpoint_env`, `api_key_env`); [`GatewayConfig::resolve_env`]
//! fills those in before [`Registry::load`](crate::registry::Registry::load)
//! validates everything in one pass.
//!
//! ```rust
//! use modelgate::config::GatewayConfig;
//!
//! let config = GatewayConfig::from_json_str(r#"{
//!     "providers": [
//!         {"name": "provider_a", "endpoint": "https://a.example/v1/chat", "api_key": "k"}
//!     ],
//!     "models": [{
//!         "internal_id": "model_fast",
//!         "display_name": "Fast Model",
//!         "capabilities": ["text_generation", "streaming"],
//!         "cost_tier": 1,
//!         "max_context_length": 8192,
//!         "provider_mapping": [{"provider": "provider_a", "model": "small-1"}]
//!     }]
//! }"#).unwrap();
//! assert_eq!(config.models.len(), 1);
//! ```

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::GatewayError;
use crate::types::{AuthType, InternalModelId, ModelCapability};

/// Top-level gateway configuration.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub idempotency: IdempotencySettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(json)
            .map_err(|e| GatewayError::Config(format!("invalid configuration JSON: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read configuration {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn with_provider(mut self, provider: ProviderEntry) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_model(mut self, model: ModelEntry) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_idempotency(mut self, settings: IdempotencySettings) -> Self {
        self.idempotency = settings;
        self
    }

    pub fn with_retry(mut self, settings: RetrySettings) -> Self {
        self.retry = settings;
        self
    }

    /// Resolve `*_env` indirections from the process environment.
    pub fn resolve_env(self) -> Self {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve `*_env` indirections with a custom lookup. Inline values win;
    /// empty values count as absent.
    pub fn resolve_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |name: &Option<String>| -> Option<String> {
            name.as_deref()
                .and_then(&lookup)
                .filter(|value| !value.trim().is_empty())
        };

        for provider in &mut self.providers {
            if provider.endpoint.as_deref().is_none_or(str::is_empty) {
                provider.endpoint = resolve(&provider.endpoint_env);
            }
            if provider.api_key.is_none() {
                provider.api_key = resolve(&provider.api_key_env).map(SecretString::from);
            }
        }
        for model in &mut self.models {
            for mapping in &mut model.provider_mapping {
                if mapping.model.trim().is_empty() {
                    mapping.model = resolve(&mapping.model_env).unwrap_or_default();
                }
            }
        }
        self
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

/// Raw provider entry. `name` is the real provider name and is only used to
/// derive the anonymized provider id.
#[derive(Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub endpoint_env: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_ref().map(|_| "[set]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auth_type", &self.auth_type)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

impl ProviderEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            endpoint_env: None,
            api_key: None,
            api_key_env: None,
            auth_type: AuthType::default(),
            max_tokens: None,
            timeout_ms: None,
            retry_attempts: None,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn endpoint_env(mut self, var: impl Into<String>) -> Self {
        self.endpoint_env = Some(var.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub const fn auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub const fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }
}

/// One `provider -> provider model name` entry, in priority order.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderModelMapping {
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub model_env: Option<String>,
}

/// Raw model entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub internal_id: InternalModelId,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<ModelCapability>,
    pub cost_tier: u8,
    pub max_context_length: u32,
    #[serde(default)]
    pub supports_streaming: Option<bool>,
    #[serde(default)]
    pub provider_mapping: Vec<ProviderModelMapping>,
}

impl ModelEntry {
    pub fn new(
        internal_id: InternalModelId,
        display_name: impl Into<String>,
        cost_tier: u8,
        max_context_length: u32,
    ) -> Self {
        Self {
            internal_id,
            display_name: display_name.into(),
            capabilities: Vec::new(),
            cost_tier,
            max_context_length,
            supports_streaming: None,
            provider_mapping: Vec::new(),
        }
    }

    pub fn capability(mut self, capability: ModelCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn map_provider(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider_mapping.push(ProviderModelMapping {
            provider: provider.into(),
            model: model.into(),
            model_env: None,
        });
        self
    }

    pub fn map_provider_env(mut self, provider: impl Into<String>, var: impl Into<String>) -> Self {
        self.provider_mapping.push(ProviderModelMapping {
            provider: provider.into(),
            model: String::new(),
            model_env: Some(var.into()),
        });
        self
    }
}

/// Idempotency store tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdempotencySettings {
    pub record_ttl_secs: u64,
    pub fingerprint_ttl_secs: u64,
    pub pending_ttl_secs: u64,
    pub in_flight_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub cache_timeout_ms: u64,
    pub cache_capacity: usize,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            record_ttl_secs: 7 * 24 * 60 * 60,
            fingerprint_ttl_secs: 5 * 60,
            pending_ttl_secs: 180,
            in_flight_wait_ms: 30_000,
            poll_interval_ms: 100,
            cache_timeout_ms: 2_000,
            cache_capacity: 10_000,
        }
    }
}

impl IdempotencySettings {
    pub const fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }

    pub const fn fingerprint_ttl(&self) -> Duration {
        Duration::from_secs(self.fingerprint_ttl_secs)
    }

    pub const fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub const fn in_flight_wait(&self) -> Duration {
        Duration::from_millis(self.in_flight_wait_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

/// Backoff between attempts against the same provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetrySettings {
    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}
