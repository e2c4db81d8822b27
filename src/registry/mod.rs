//! Model Capability Registry
//!
//! The registry is built once from a [`GatewayConfig`] and is immutable
//! afterwards. Share it behind an `Arc`; every read is a plain lookup.
//!
//! Loading does all validation up front:
//! - provider names are hashed into [`ProviderId`]s and the plaintext is dropped
//! - providers missing an endpoint or a sendable credential are dropped (and logged)
//! - malformed models (duplicate ids, bad cost tier, provider names leaking
//!   into display names) reject the whole configuration
//! - zero usable providers or zero usable models is a [`GatewayError::Config`]

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use secrecy::ExposeSecret;

use crate::config::{GatewayConfig, ModelEntry, ProviderEntry};
use crate::error::GatewayError;
use crate::transport::provider_headers;
use crate::types::{
    CostTier, InternalModelId, ModelCapability, ModelConfig, ModelSummary, ProviderConfig,
    ProviderId,
};

mod directory;

pub use directory::ProviderDirectory;

/// Immutable model registry plus provider directory.
#[derive(Debug)]
pub struct Registry {
    models: Vec<ModelConfig>,
    index: HashMap<InternalModelId, usize>,
    directory: ProviderDirectory,
}

impl Registry {
    /// Build the registry from a resolved configuration.
    pub fn load(config: GatewayConfig) -> Result<Self, GatewayError> {
        Self::from_entries(config.providers, config.models)
    }

    pub fn from_entries(
        providers: Vec<ProviderEntry>,
        models: Vec<ModelEntry>,
    ) -> Result<Self, GatewayError> {
        // Lowercased names live only for the display-name check below.
        let mut provider_names: Vec<String> = providers
            .iter()
            .map(|p| p.name.trim().to_lowercase())
            .chain(
                models
                    .iter()
                    .flat_map(|m| m.provider_mapping.iter())
                    .map(|m| m.provider.trim().to_lowercase()),
            )
            .filter(|name| !name.is_empty())
            .collect();
        provider_names.sort_unstable();
        provider_names.dedup();

        let configured = providers.len();
        let mut directory = ProviderDirectory::new();
        for (index, entry) in providers.into_iter().enumerate() {
            match build_provider(entry) {
                Ok(provider) => {
                    tracing::debug!(provider = %provider.provider_id.short(), "provider registered");
                    directory.insert(provider);
                }
                Err(reason) => {
                    tracing::warn!(index, reason, "dropping unusable provider entry");
                }
            }
        }
        if directory.is_empty() {
            return Err(GatewayError::Config(format!(
                "no usable providers ({configured} configured)"
            )));
        }

        let mut registry = Self {
            models: Vec::with_capacity(models.len()),
            index: HashMap::new(),
            directory,
        };

        for entry in models {
            let id = entry.internal_id;
            if registry.index.contains_key(&id) {
                return Err(GatewayError::Config(format!("duplicate model id: {id}")));
            }
            let Some(model) = build_model(entry, &provider_names)? else {
                tracing::warn!(model = %id, "dropping model without any provider mapping");
                continue;
            };
            registry.index.insert(id, registry.models.len());
            registry.models.push(model);
        }

        if registry.models.is_empty() {
            return Err(GatewayError::Config("no usable models".to_string()));
        }

        tracing::info!(
            models = registry.models.len(),
            providers = registry.directory.len(),
            dropped_providers = configured - registry.directory.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    pub fn get_model(&self, id: InternalModelId) -> Result<&ModelConfig, GatewayError> {
        self.index
            .get(&id)
            .map(|&i| &self.models[i])
            .ok_or_else(|| GatewayError::NotFound {
                model: id.to_string(),
            })
    }

    /// Capabilities of a model; empty for unknown ids.
    pub fn get_capabilities(&self, id: InternalModelId) -> Vec<ModelCapability> {
        self.get_model(id)
            .map(|m| m.capabilities.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn supports_capability(&self, id: InternalModelId, capability: ModelCapability) -> bool {
        self.get_model(id)
            .map(|m| m.has_capability(capability))
            .unwrap_or(false)
    }

    /// Model ids in declared order.
    pub fn list_models(&self) -> Vec<InternalModelId> {
        self.models.iter().map(|m| m.internal_id).collect()
    }

    /// Cheapest model offering `capability`, ties broken by declared order.
    pub fn cheapest_with_capability(&self, capability: ModelCapability) -> Option<&ModelConfig> {
        self.models
            .iter()
            .filter(|m| m.has_capability(capability))
            .min_by_key(|m| m.cost_tier)
    }

    pub fn model_summaries(&self) -> Vec<ModelSummary> {
        self.models.iter().map(ModelConfig::summary).collect()
    }

    pub fn directory(&self) -> &ProviderDirectory {
        &self.directory
    }
}

fn build_provider(entry: ProviderEntry) -> Result<ProviderConfig, &'static str> {
    let ProviderEntry {
        name,
        endpoint,
        api_key,
        auth_type,
        max_tokens,
        timeout_ms,
        retry_attempts,
        ..
    } = entry;

    if name.trim().is_empty() {
        return Err("missing provider name");
    }
    let provider_id = ProviderId::from_name(name.trim());
    drop(name);

    let endpoint = endpoint
        .filter(|e| !e.trim().is_empty())
        .ok_or("missing endpoint")?;
    let credential = api_key
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or("missing credential")?;
    let endpoint = reqwest::Url::parse(endpoint.trim()).map_err(|_| "endpoint is not a valid URL")?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err("endpoint must use http or https");
    }
    let timeout = match timeout_ms {
        Some(0) => return Err("timeout must be positive"),
        Some(ms) => Duration::from_millis(ms),
        None => ProviderConfig::DEFAULT_TIMEOUT,
    };

    let provider = ProviderConfig {
        provider_id,
        endpoint,
        auth_type,
        credential,
        max_tokens: max_tokens
            .filter(|&m| m > 0)
            .unwrap_or(ProviderConfig::DEFAULT_MAX_TOKENS),
        timeout,
        retry_attempts: retry_attempts.unwrap_or(ProviderConfig::DEFAULT_RETRY_ATTEMPTS),
    };
    provider_headers(&provider).map_err(|_| "credential is not a valid header value")?;
    Ok(provider)
}

fn build_model(
    entry: ModelEntry,
    provider_names: &[String],
) -> Result<Option<ModelConfig>, GatewayError> {
    let id = entry.internal_id;
    let cost_tier = CostTier::new(entry.cost_tier)
        .map_err(|e| GatewayError::Config(format!("model {id}: {e}")))?;

    let display_name = entry.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(GatewayError::Config(format!("model {id}: empty display name")));
    }
    let lowered = display_name.to_lowercase();
    if provider_names.iter().any(|name| lowered.contains(name.as_str())) {
        return Err(GatewayError::Config(format!(
            "model {id}: display name must not reference a provider"
        )));
    }

    let mut provider_mapping: Vec<(ProviderId, String)> = Vec::new();
    for mapping in entry.provider_mapping {
        let model_name = mapping.model.trim();
        if mapping.provider.trim().is_empty() || model_name.is_empty() {
            continue;
        }
        let provider_id = ProviderId::from_name(mapping.provider.trim());
        if provider_mapping.iter().any(|(existing, _)| existing == &provider_id) {
            continue;
        }
        provider_mapping.push((provider_id, model_name.to_string()));
    }
    if provider_mapping.is_empty() {
        return Ok(None);
    }

    let capabilities: BTreeSet<ModelCapability> = entry.capabilities.into_iter().collect();
    let supports_streaming = entry
        .supports_streaming
        .unwrap_or_else(|| capabilities.contains(&ModelCapability::Streaming));

    Ok(Some(ModelConfig {
        internal_id: id,
        display_name,
        capabilities,
        cost_tier,
        max_context_length: entry.max_context_length,
        supports_streaming,
        provider_mapping,
    }))
}
