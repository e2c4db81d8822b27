//! Shared cache store
//!
//! The idempotency layer only needs a small key/value surface with per-key
//! TTLs, an atomic "set if absent" and compare-and-swap on exact values. [`MemoryCacheStore`] is the in-process
//! implementation; a networked store plugs in through [`CacheStore`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::GatewayError;

pub mod memory;

pub use memory::MemoryCacheStore;

/// Cache store failures. Never shown to end users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache store unreachable: {0}")]
    Unreachable(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache entry is corrupt: {0}")]
    Corrupt(String),
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        GatewayError::CacheUnavailable(err.to_string())
    }
}

/// Key/value store with expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write `value`, replacing any previous one. Returns `true` once stored.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError>;

    /// Write `value` only if no live value exists. Returns `true` if this call wrote it.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration)
    -> Result<bool, CacheError>;

    /// Remove `key`. Returns `true` if a value was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Replace `key` only while its live value is exactly `expected`.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Remove `key` only while its live value is exactly `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, CacheError>;
}
