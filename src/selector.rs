//! Failover Selector
//!
//! Chooses which provider serves a model. The default strategy walks the
//! model's provider mapping in declared priority order and takes the first
//! provider present in the directory. Alternative ranking strategies (latency
//! or error-rate scored) plug in behind [`ProviderSelector`].

use std::sync::Arc;

use crate::error::GatewayError;
use crate::registry::ProviderDirectory;
use crate::types::{ModelConfig, ProviderConfig};

/// A provider chosen for one call, plus the provider-side model name.
#[derive(Debug, Clone)]
pub struct SelectedProvider {
    pub provider: Arc<ProviderConfig>,
    pub provider_model: String,
}

/// Provider selection strategy.
pub trait ProviderSelector: Send + Sync {
    fn select(
        &self,
        model: &ModelConfig,
        directory: &ProviderDirectory,
    ) -> Result<SelectedProvider, GatewayError>;
}

/// Static priority-ordered failover. Deterministic for a fixed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityOrderSelector;

impl ProviderSelector for PriorityOrderSelector {
    fn select(
        &self,
        model: &ModelConfig,
        directory: &ProviderDirectory,
    ) -> Result<SelectedProvider, GatewayError> {
        select_provider(model, directory)
    }
}

/// First mapping entry whose provider is configured, in declared order.
pub fn select_provider(
    model: &ModelConfig,
    directory: &ProviderDirectory,
) -> Result<SelectedProvider, GatewayError> {
    model
        .provider_mapping
        .iter()
        .find_map(|(provider_id, provider_model)| {
            directory.get(provider_id).map(|provider| SelectedProvider {
                provider: Arc::clone(provider),
                provider_model: provider_model.clone(),
            })
        })
        .ok_or(GatewayError::NoProviderAvailable {
            model: model.internal_id,
        })
}
