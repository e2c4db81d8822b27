//! Provider Directory
//!
//! Maps anonymized provider ids to their endpoint, auth and retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{ProviderConfig, ProviderId};

/// Immutable set of usable providers.
#[derive(Debug, Default)]
pub struct ProviderDirectory {
    by_id: HashMap<ProviderId, Arc<ProviderConfig>>,
}

impl ProviderDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Later entries with the same id replace earlier ones.
    pub(crate) fn insert(&mut self, config: ProviderConfig) {
        self.by_id
            .insert(config.provider_id.clone(), Arc::new(config));
    }

    pub fn get(&self, id: &ProviderId) -> Option<&Arc<ProviderConfig>> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.by_id.keys()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<ProviderConfig>> {
        self.by_id.values()
    }
}
