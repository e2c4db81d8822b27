//! Gateway Orchestrator
//!
//! [`Gateway::send_request`] runs one request through
//! validate → resolve → select → translate → dispatch → transform.
//! [`Gateway::handle`] wraps that with the idempotency flow: header policy,
//! replay of completed keys, an atomic claim before dispatch and fingerprint
//! dedup for requests without a key.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use tokio::time::timeout;
use validator::Validate;

use crate::cache::CacheStore;
use crate::config::{GatewayConfig, RetrySettings};
use crate::error::{GatewayError, UpstreamFailure};
use crate::idempotency::{
    CacheLookup, ClaimOutcome, IdempotencyGuard, IdempotencyKey, IdempotencyPolicy,
    IdempotencyStore, RequestFingerprint,
};
use crate::registry::Registry;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::selector::{PriorityOrderSelector, ProviderSelector};
use crate::transformers::{ChatPayloadTransformer, RequestTransformer, ResponseTransformer};
use crate::transport::{HttpTransport, ProviderTransport};
use crate::types::{ModelRequest, ModelResponse, ModelSummary};

/// An inbound call as seen by the HTTP layer.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub request: ModelRequest,
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Caller identity for fingerprinting; falls back to `request.user`.
    pub actor: Option<String>,
    /// Raw `Idempotency-Key` header value.
    pub idempotency_key: Option<String>,
    pub policy: IdempotencyPolicy,
}

impl InboundRequest {
    /// A `POST` to `path` with the default (required) key policy.
    pub fn post(path: impl Into<String>, request: ModelRequest) -> Self {
        Self {
            request,
            method: Method::POST,
            path: path.into(),
            query: BTreeMap::new(),
            actor: None,
            idempotency_key: None,
            policy: IdempotencyPolicy::Required,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub const fn with_policy(mut self, policy: IdempotencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn fingerprint(&self) -> RequestFingerprint {
        let body = serde_json::to_value(&self.request).unwrap_or_default();
        let actor = self.actor.as_deref().or(self.request.user.as_deref());
        RequestFingerprint::compute(self.method.as_str(), &self.path, &body, &self.query, actor)
    }
}

/// Outcome of [`Gateway::handle`].
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub response: ModelResponse,
    /// `true` when the response came from the cache instead of a provider call.
    pub replayed: bool,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl GatewayReply {
    fn fresh(response: ModelResponse, idempotency_key: Option<IdempotencyKey>) -> Self {
        Self {
            response,
            replayed: false,
            idempotency_key,
        }
    }

    fn replay(response: ModelResponse, idempotency_key: Option<IdempotencyKey>) -> Self {
        Self {
            response,
            replayed: true,
            idempotency_key,
        }
    }
}

/// Request orchestrator. Cheap to share behind an `Arc`.
pub struct Gateway {
    registry: Arc<Registry>,
    selector: Arc<dyn ProviderSelector>,
    transport: Arc<dyn ProviderTransport>,
    request_transformer: Arc<dyn RequestTransformer>,
    response_transformer: Arc<dyn ResponseTransformer>,
    idempotency: Option<IdempotencyStore>,
    retry: RetrySettings,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("idempotency", &self.idempotency)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Load the registry and wire defaults with an in-process cache store.
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        let idempotency = IdempotencyStore::in_memory(config.idempotency.clone());
        let retry = config.retry.clone();
        let registry = Registry::load(config)?;
        GatewayBuilder::new()
            .registry(Arc::new(registry))
            .idempotency(idempotency)
            .retry(retry)
            .build()
    }

    /// Like [`from_config`](Self::from_config) but on a caller-supplied store.
    pub fn from_config_with_cache(
        config: GatewayConfig,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, GatewayError> {
        let idempotency = IdempotencyStore::new(cache, config.idempotency.clone());
        let retry = config.retry.clone();
        let registry = Registry::load(config)?;
        GatewayBuilder::new()
            .registry(Arc::new(registry))
            .idempotency(idempotency)
            .retry(retry)
            .build()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Provider-free model listing.
    pub fn list_models(&self) -> Vec<ModelSummary> {
        self.registry.model_summaries()
    }

    /// Execute a single request. No idempotency handling.
    pub async fn send_request(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        request.validate()?;

        let model = self.registry.get_model(request.internal_model_id)?;
        let selected = self.selector.select(model, self.registry.directory())?;
        let provider = selected.provider.as_ref();

        tracing::debug!(
            model = %model.internal_id,
            provider = provider.provider_id.short(),
            "provider selected"
        );

        let payload = self.request_transformer.transform_request(
            request,
            &selected.provider_model,
            provider,
        )?;

        let executor =
            RetryExecutor::new(RetryPolicy::for_provider(provider.retry_attempts, &self.retry));
        let transport = self.transport.as_ref();
        let payload = &payload;
        let mut attempts_made = 0;

        let outcome = executor
            .execute(|attempt| {
                attempts_made = attempt;
                async move {
                    tracing::debug!(attempt, provider = provider.provider_id.short(), "dispatching");
                    match timeout(provider.timeout, transport.send(provider, payload)).await {
                        Ok(result) => result,
                        Err(_) => Err(GatewayError::ProviderTimeout {
                            timeout: provider.timeout,
                        }),
                    }
                }
            })
            .await;

        let raw = outcome.map_err(|error| {
            let error = surface_upstream(error, attempts_made);
            tracing::warn!(
                model = %model.internal_id,
                provider = provider.provider_id.short(),
                attempts = attempts_made,
                kind = error.kind(),
                "provider call failed"
            );
            error
        })?;

        self.response_transformer
            .transform_response(&raw, request.internal_model_id)
    }

    /// Execute an inbound call with idempotency handling.
    pub async fn handle(&self, inbound: InboundRequest) -> Result<GatewayReply, GatewayError> {
        let key = IdempotencyGuard::inspect(
            &inbound.method,
            inbound.idempotency_key.as_deref(),
            inbound.policy,
        )?;
        inbound.request.validate()?;

        let Some(store) = self.idempotency.as_ref() else {
            let response = self.send_request(&inbound.request).await?;
            return Ok(GatewayReply::fresh(response, key));
        };

        let fingerprint = inbound.fingerprint();

        match key {
            Some(key) => self.handle_keyed(store, key, &inbound, &fingerprint).await,
            None => {
                if let Some(response) = store.check_fingerprint(&fingerprint).await {
                    tracing::debug!(fingerprint = %fingerprint, "replaying duplicate request");
                    return Ok(GatewayReply::replay(response, None));
                }
                let response = self.send_request(&inbound.request).await?;
                store.store_fingerprint(&fingerprint, &response).await;
                Ok(GatewayReply::fresh(response, None))
            }
        }
    }

    async fn handle_keyed(
        &self,
        store: &IdempotencyStore,
        key: IdempotencyKey,
        inbound: &InboundRequest,
        fingerprint: &RequestFingerprint,
    ) -> Result<GatewayReply, GatewayError> {
        if let CacheLookup::Hit(response) = store.check_cache(&key).await {
            tracing::debug!(key = %key, "replaying cached response");
            return Ok(GatewayReply::replay(response, Some(key)));
        }

        let claimed = match store.acquire(&key).await {
            ClaimOutcome::Completed(response) => {
                tracing::debug!(key = %key, "replaying response from concurrent request");
                return Ok(GatewayReply::replay(response, Some(key)));
            }
            ClaimOutcome::InFlight => return Err(GatewayError::RequestInFlight),
            ClaimOutcome::Claimed(token) => Some(token),
            ClaimOutcome::Unavailable => None,
        };

        match self.send_request(&inbound.request).await {
            Ok(response) => {
                store.store_response(&key, claimed.as_ref(), &response).await;
                store.store_fingerprint(fingerprint, &response).await;
                Ok(GatewayReply::fresh(response, Some(key)))
            }
            Err(error) => {
                if let Some(token) = &claimed {
                    store.release(&key, token).await;
                }
                Err(error)
            }
        }
    }
}

/// Fold the last upstream failure into the generic error returned to callers.
fn surface_upstream(error: GatewayError, attempts: u32) -> GatewayError {
    match error {
        GatewayError::ProviderTimeout { .. } => GatewayError::ProviderError {
            attempts,
            cause: UpstreamFailure::Timeout,
        },
        GatewayError::ProviderError { cause, .. } => GatewayError::ProviderError { attempts, cause },
        other => other,
    }
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    registry: Option<Arc<Registry>>,
    selector: Arc<dyn ProviderSelector>,
    transport: Arc<dyn ProviderTransport>,
    request_transformer: Arc<dyn RequestTransformer>,
    response_transformer: Arc<dyn ResponseTransformer>,
    idempotency: Option<IdempotencyStore>,
    retry: RetrySettings,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            selector: Arc::new(PriorityOrderSelector),
            transport: Arc::new(HttpTransport::new()),
            request_transformer: Arc::new(ChatPayloadTransformer),
            response_transformer: Arc::new(ChatPayloadTransformer),
            idempotency: None,
            retry: RetrySettings::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn selector(mut self, selector: Arc<dyn ProviderSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn ProviderTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn request_transformer(mut self, transformer: Arc<dyn RequestTransformer>) -> Self {
        self.request_transformer = transformer;
        self
    }

    pub fn response_transformer(mut self, transformer: Arc<dyn ResponseTransformer>) -> Self {
        self.response_transformer = transformer;
        self
    }

    pub fn idempotency(mut self, store: IdempotencyStore) -> Self {
        self.idempotency = Some(store);
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<Gateway, GatewayError> {
        let registry = self
            .registry
            .ok_or_else(|| GatewayError::Config("gateway requires a registry".into()))?;
        if let Some(store) = &self.idempotency {
            check_claim_outlives_calls(store, &registry, &self.retry)?;
        }
        Ok(Gateway {
            registry,
            selector: self.selector,
            transport: self.transport,
            request_transformer: self.request_transformer,
            response_transformer: self.response_transformer,
            idempotency: self.idempotency,
            retry: self.retry,
        })
    }
}

/// A pending claim must not expire while its owner can still be executing.
fn check_claim_outlives_calls(
    store: &IdempotencyStore,
    registry: &Registry,
    retry: &RetrySettings,
) -> Result<(), GatewayError> {
    let settings = store.settings();
    let longest_call = registry
        .directory()
        .providers()
        .map(|provider| {
            RetryPolicy::for_provider(provider.retry_attempts, retry)
                .worst_case_duration(provider.timeout)
        })
        .max()
        .unwrap_or_default();
    let needed = longest_call.saturating_add(settings.cache_timeout());
    if settings.pending_ttl() < needed {
        return Err(GatewayError::Config(format!(
            "idempotency pending_ttl ({}s) must cover the longest provider call ({}ms)",
            settings.pending_ttl().as_secs(),
            needed.as_millis()
        )));
    }
    Ok(())
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
