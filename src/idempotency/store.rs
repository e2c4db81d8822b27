//! Idempotency store
//!
//! Records live in the shared [`CacheStore`] under `idempotency:<key>` as a
//! tagged JSON [`IdempotencyEntry`]. A claim is a `set_if_absent` of a
//! `pending` entry carrying a fresh owner id; the winner later swaps it for
//! `completed` or deletes it on failure. Both happen only while the stored
//! record is still that exact claim, so a winner whose claim expired cannot
//! disturb the next owner.
//!
//! Reads fail open: an unreachable store behaves like an empty one. Writes
//! are best-effort and only logged.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep, timeout};
use uuid::Uuid;

use super::{IdempotencyKey, RequestFingerprint};
use crate::cache::{CacheError, CacheStore, MemoryCacheStore};
use crate::config::IdempotencySettings;
use crate::types::ModelResponse;

/// Value stored under an idempotency or fingerprint cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IdempotencyEntry {
    Pending {
        claimed_by: Uuid,
        claimed_at: DateTime<Utc>,
    },
    Completed {
        response: ModelResponse,
        completed_at: DateTime<Utc>,
    },
}

impl IdempotencyEntry {
    fn pending(owner: Uuid) -> Self {
        Self::Pending {
            claimed_by: owner,
            claimed_at: Utc::now(),
        }
    }

    fn completed(response: &ModelResponse) -> Self {
        Self::Completed {
            response: response.clone(),
            completed_at: Utc::now(),
        }
    }
}

/// Result of [`IdempotencyStore::check_cache`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(ModelResponse),
    Pending,
    Miss,
}

/// Proof of ownership of a pending claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimToken {
    owner: Uuid,
    record: String,
}

impl ClaimToken {
    pub fn owner(&self) -> Uuid {
        self.owner
    }
}

/// Result of [`IdempotencyStore::claim`] and [`IdempotencyStore::acquire`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// This caller owns the key and must execute.
    Claimed(ClaimToken),
    /// Another caller already finished; replay its response.
    Completed(ModelResponse),
    /// Another caller holds the key and has not finished.
    InFlight,
    /// The store could not be reached; execute without a claim.
    Unavailable,
}

/// Idempotency records on top of a [`CacheStore`].
#[derive(Clone)]
pub struct IdempotencyStore {
    cache: Arc<dyn CacheStore>,
    settings: IdempotencySettings,
}

impl std::fmt::Debug for IdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl IdempotencyStore {
    pub fn new(cache: Arc<dyn CacheStore>, settings: IdempotencySettings) -> Self {
        Self { cache, settings }
    }

    /// Store backed by a fresh [`MemoryCacheStore`] sized from `settings`.
    pub fn in_memory(settings: IdempotencySettings) -> Self {
        let cache = Arc::new(MemoryCacheStore::new(settings.cache_capacity));
        Self::new(cache, settings)
    }

    pub fn settings(&self) -> &IdempotencySettings {
        &self.settings
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let limit = self.settings.cache_timeout();
        match timeout(limit, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(limit)),
        }
    }

    async fn read_entry(&self, cache_key: &str) -> Result<Option<IdempotencyEntry>, CacheError> {
        let Some(raw) = self.bounded(self.cache.get(cache_key)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    fn encode(entry: &IdempotencyEntry) -> Result<String, CacheError> {
        serde_json::to_string(entry).map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    async fn write_entry(
        &self,
        cache_key: &str,
        entry: &IdempotencyEntry,
        ttl: std::time::Duration,
    ) -> Result<bool, CacheError> {
        let raw = Self::encode(entry)?;
        self.bounded(self.cache.set(cache_key, raw, ttl)).await
    }

    /// Look up a key. Store failures and undecodable records count as a miss.
    pub async fn check_cache(&self, key: &IdempotencyKey) -> CacheLookup {
        match self.read_entry(&key.cache_key()).await {
            Ok(Some(IdempotencyEntry::Completed { response, .. })) => CacheLookup::Hit(response),
            Ok(Some(IdempotencyEntry::Pending { .. })) => CacheLookup::Pending,
            Ok(None) => CacheLookup::Miss,
            Err(error) => {
                tracing::warn!(%error, "idempotency lookup failed, treating as miss");
                CacheLookup::Miss
            }
        }
    }

    /// Try once to take ownership of `key`.
    pub async fn claim(&self, key: &IdempotencyKey) -> ClaimOutcome {
        let cache_key = key.cache_key();
        let owner = Uuid::new_v4();
        let Ok(record) = Self::encode(&IdempotencyEntry::pending(owner)) else {
            return ClaimOutcome::Unavailable;
        };

        let claimed = self
            .bounded(self.cache.set_if_absent(
                &cache_key,
                record.clone(),
                self.settings.pending_ttl(),
            ))
            .await;

        match claimed {
            Ok(true) => ClaimOutcome::Claimed(ClaimToken { owner, record }),
            Ok(false) => match self.read_entry(&cache_key).await {
                Ok(Some(IdempotencyEntry::Completed { response, .. })) => {
                    ClaimOutcome::Completed(response)
                }
                // Gone between the two calls: the holder released it. Report
                // in-flight and let the waiter re-claim on its next poll.
                Ok(Some(IdempotencyEntry::Pending { .. })) | Ok(None) => ClaimOutcome::InFlight,
                Err(error) => {
                    tracing::warn!(%error, "idempotency record unreadable, proceeding unclaimed");
                    ClaimOutcome::Unavailable
                }
            },
            Err(error) => {
                tracing::warn!(%error, "idempotency claim failed, proceeding unclaimed");
                ClaimOutcome::Unavailable
            }
        }
    }

    /// Claim `key`, waiting for a concurrent holder to finish if necessary.
    ///
    /// Polls every `poll_interval` for up to `in_flight_wait`. Returns
    /// [`ClaimOutcome::InFlight`] only when the holder is still pending at
    /// the deadline.
    pub async fn acquire(&self, key: &IdempotencyKey) -> ClaimOutcome {
        let deadline = Instant::now() + self.settings.in_flight_wait();
        loop {
            match self.claim(key).await {
                ClaimOutcome::InFlight => {}
                outcome => return outcome,
            }
            if Instant::now() >= deadline {
                tracing::debug!(key = %key, "idempotency key still in flight");
                return ClaimOutcome::InFlight;
            }
            sleep(self.settings.poll_interval()).await;
        }
    }

    /// Persist the final response under `key`. Returns whether it was stored.
    ///
    /// With a claim, the record is only replaced while that claim is still
    /// the stored value. Without one (the store was down at claim time) the
    /// response is only written if the key is free.
    pub async fn store_response(
        &self,
        key: &IdempotencyKey,
        claim: Option<&ClaimToken>,
        response: &ModelResponse,
    ) -> bool {
        let cache_key = key.cache_key();
        let raw = match Self::encode(&IdempotencyEntry::completed(response)) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "failed to encode idempotent response");
                return false;
            }
        };
        let ttl = self.settings.record_ttl();
        let written = match claim {
            Some(token) => {
                self.bounded(self.cache.compare_and_set(&cache_key, &token.record, raw, ttl))
                    .await
            }
            None => self.bounded(self.cache.set_if_absent(&cache_key, raw, ttl)).await,
        };
        match written {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(key = %key, "idempotency claim lost before completion, response not recorded");
                false
            }
            Err(error) => {
                tracing::warn!(%error, "failed to store idempotent response");
                false
            }
        }
    }

    /// Drop a pending claim after a failed execution. A claim that already
    /// expired or passed to another owner is left alone.
    pub async fn release(&self, key: &IdempotencyKey, claim: &ClaimToken) {
        match self
            .bounded(self.cache.compare_and_delete(&key.cache_key(), &claim.record))
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::debug!(key = %key, "idempotency claim already gone"),
            Err(error) => tracing::warn!(%error, "failed to release idempotency claim"),
        }
    }

    /// Response previously stored for an identical request, if any.
    pub async fn check_fingerprint(&self, fingerprint: &RequestFingerprint) -> Option<ModelResponse> {
        match self.read_entry(&fingerprint.cache_key()).await {
            Ok(Some(IdempotencyEntry::Completed { response, .. })) => Some(response),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(%error, "fingerprint lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn store_fingerprint(
        &self,
        fingerprint: &RequestFingerprint,
        response: &ModelResponse,
    ) -> bool {
        let entry = IdempotencyEntry::completed(response);
        match self
            .write_entry(
                &fingerprint.cache_key(),
                &entry,
                self.settings.fingerprint_ttl(),
            )
            .await
        {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!(%error, "failed to store request fingerprint");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, InternalModelId, Usage};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unreachable("connection refused".into()))
        }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
            Err(CacheError::Unreachable("connection refused".into()))
        }
        async fn set_if_absent(&self, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
            Err(CacheError::Unreachable("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Unreachable("connection refused".into()))
        }
        async fn compare_and_set(
            &self,
            _: &str,
            _: &str,
            _: String,
            _: Duration,
        ) -> Result<bool, CacheError> {
            Err(CacheError::Unreachable("connection refused".into()))
        }
        async fn compare_and_delete(&self, _: &str, _: &str) -> Result<bool, CacheError> {
            Err(CacheError::Unreachable("connection refused".into()))
        }
    }

    struct HangingStore;

    #[async_trait]
    impl CacheStore for HangingStore {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            std::future::pending().await
        }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
            std::future::pending().await
        }
        async fn set_if_absent(&self, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
            std::future::pending().await
        }
        async fn delete(&self, _: &str) -> Result<bool, CacheError> {
            std::future::pending().await
        }
        async fn compare_and_set(
            &self,
            _: &str,
            _: &str,
            _: String,
            _: Duration,
        ) -> Result<bool, CacheError> {
            std::future::pending().await
        }
        async fn compare_and_delete(&self, _: &str, _: &str) -> Result<bool, CacheError> {
            std::future::pending().await
        }
    }

    fn settings() -> IdempotencySettings {
        IdempotencySettings {
            in_flight_wait_ms: 200,
            poll_interval_ms: 10,
            cache_timeout_ms: 50,
            ..IdempotencySettings::default()
        }
    }

    fn response(content: &str) -> ModelResponse {
        ModelResponse {
            content: content.to_string(),
            usage: Usage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            },
            model: InternalModelId::ModelFast,
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        }
    }

    fn key() -> IdempotencyKey {
        IdempotencyKey::parse("a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d").unwrap()
    }

    async fn claimed(store: &IdempotencyStore) -> ClaimToken {
        match store.claim(&key()).await {
            ClaimOutcome::Claimed(token) => token,
            other => panic!("expected a claim, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let store = IdempotencyStore::in_memory(settings());
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Miss);
        assert!(store.store_response(&key(), None, &response("ok")).await);
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Hit(response("ok")));
        // Unclaimed writes never replace an existing record.
        assert!(!store.store_response(&key(), None, &response("other")).await);
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Hit(response("ok")));
    }

    #[tokio::test]
    async fn second_claim_sees_pending_then_completed() {
        let store = IdempotencyStore::in_memory(settings());
        let token = claimed(&store).await;
        assert_eq!(store.claim(&key()).await, ClaimOutcome::InFlight);
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Pending);

        assert!(store.store_response(&key(), Some(&token), &response("done")).await);
        assert_eq!(
            store.claim(&key()).await,
            ClaimOutcome::Completed(response("done"))
        );
    }

    #[tokio::test]
    async fn release_clears_the_claim() {
        let store = IdempotencyStore::in_memory(settings());
        let token = claimed(&store).await;
        store.release(&key(), &token).await;
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Miss);
        let next = claimed(&store).await;
        assert_ne!(next.owner(), token.owner());
    }

    #[tokio::test]
    async fn expired_claim_cannot_disturb_next_owner() {
        let store = IdempotencyStore::in_memory(IdempotencySettings {
            pending_ttl_secs: 1,
            ..settings()
        });
        let first = claimed(&store).await;
        sleep(Duration::from_millis(1100)).await;

        let second = claimed(&store).await;
        store.release(&key(), &first).await;
        assert_eq!(store.claim(&key()).await, ClaimOutcome::InFlight);
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Pending);

        assert!(!store.store_response(&key(), Some(&first), &response("stale")).await);
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Pending);

        assert!(store.store_response(&key(), Some(&second), &response("fresh")).await);
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Hit(response("fresh")));
    }

    #[tokio::test]
    async fn acquire_waits_for_holder() {
        let store = IdempotencyStore::in_memory(settings());
        let token = claimed(&store).await;

        let holder = store.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(40)).await;
            holder.store_response(&key(), Some(&token), &response("late")).await;
        });

        assert_eq!(
            store.acquire(&key()).await,
            ClaimOutcome::Completed(response("late"))
        );
    }

    #[tokio::test]
    async fn acquire_reclaims_after_release() {
        let store = IdempotencyStore::in_memory(settings());
        let token = claimed(&store).await;

        let holder = store.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(40)).await;
            holder.release(&key(), &token).await;
        });

        assert!(matches!(store.acquire(&key()).await, ClaimOutcome::Claimed(_)));
    }

    #[tokio::test]
    async fn acquire_gives_up_at_deadline() {
        let store = IdempotencyStore::in_memory(settings());
        claimed(&store).await;
        let started = std::time::Instant::now();
        assert_eq!(store.acquire(&key()).await, ClaimOutcome::InFlight);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn unreachable_store_fails_open() {
        let store = IdempotencyStore::new(Arc::new(DownStore), settings());
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Miss);
        assert_eq!(store.claim(&key()).await, ClaimOutcome::Unavailable);
        assert_eq!(store.acquire(&key()).await, ClaimOutcome::Unavailable);
        assert!(!store.store_response(&key(), None, &response("x")).await);

        let fp = RequestFingerprint::compute(
            "POST",
            "/v1/generate",
            &serde_json::json!({}),
            &BTreeMap::new(),
            None,
        );
        assert_eq!(store.check_fingerprint(&fp).await, None);
        assert!(!store.store_fingerprint(&fp, &response("x")).await);
    }

    #[tokio::test]
    async fn hanging_store_is_bounded() {
        let store = IdempotencyStore::new(Arc::new(HangingStore), settings());
        let started = std::time::Instant::now();
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Miss);
        assert_eq!(store.claim(&key()).await, ClaimOutcome::Unavailable);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn corrupt_record_is_a_miss() {
        let cache = Arc::new(MemoryCacheStore::new(8));
        cache
            .set(&key().cache_key(), "{not json".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let store = IdempotencyStore::new(cache, settings());
        assert_eq!(store.check_cache(&key()).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn fingerprint_round_trip() {
        let store = IdempotencyStore::in_memory(settings());
        let fp = RequestFingerprint::compute(
            "POST",
            "/v1/generate",
            &serde_json::json!({"prompt": "hi"}),
            &BTreeMap::new(),
            Some("actor-1"),
        );
        assert_eq!(store.check_fingerprint(&fp).await, None);
        assert!(store.store_fingerprint(&fp, &response("fp")).await);
        assert_eq!(store.check_fingerprint(&fp).await, Some(response("fp")));
    }
}
