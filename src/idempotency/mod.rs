//! Idempotency
//!
//! - key.rs: `Idempotency-Key` parsing (UUID v4)
//! - fingerprint.rs: implicit dedup hashes
//! - store.rs: claim / replay records on a [`CacheStore`](crate::cache::CacheStore)
//! - guard.rs: header policy for mutating verbs

pub mod fingerprint;
pub mod guard;
pub mod key;
pub mod store;

pub use fingerprint::RequestFingerprint;
pub use guard::{IdempotencyGuard, IdempotencyPolicy};
pub use key::{IdempotencyKey, is_valid_idempotency_key, validate_idempotency_key};
pub use store::{CacheLookup, ClaimOutcome, ClaimToken, IdempotencyEntry, IdempotencyStore};
