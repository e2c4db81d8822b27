//! In-process cache store: an LRU map with per-entry expiry.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex as TokioMutex;

use super::{CacheError, CacheStore};

pub const DEFAULT_CAPACITY: usize = 10_000;

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded in-memory [`CacheStore`].
///
/// Expired entries are dropped lazily on access; the LRU bound evicts the rest.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: TokioMutex<LruCache<String, CacheEntry>>,
}

impl MemoryCacheStore {
    /// Create a store holding at most `capacity` entries (0 falls back to the default).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: TokioMutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn entry(value: String, ttl: Duration) -> CacheEntry {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        CacheEntry { value, expires_at }
    }

    fn holds(entries: &LruCache<String, CacheEntry>, key: &str, expected: &str) -> bool {
        entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired() && entry.value == expected)
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        entries.put(key.to_string(), Self::entry(value, ttl));
        Ok(true)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        if entries.peek(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        entries.put(key.to_string(), Self::entry(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().await.pop(key).is_some())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        if !Self::holds(&entries, key, expected) {
            return Ok(false);
        }
        entries.put(key.to_string(), Self::entry(value, ttl));
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        if !Self::holds(&entries, key, expected) {
            return Ok(false);
        }
        Ok(entries.pop(key).is_some())
    }
}
