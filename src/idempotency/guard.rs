//! Idempotency-Key header handling for inbound requests.

use reqwest::Method;

use super::IdempotencyKey;
use crate::error::GatewayError;

/// Whether an endpoint insists on an `Idempotency-Key` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdempotencyPolicy {
    #[default]
    Required,
    Optional,
}

/// Stateless header check applied before any cache or provider work.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyGuard;

impl IdempotencyGuard {
    /// Methods that change state and therefore take part in idempotency.
    pub fn is_mutating(method: &Method) -> bool {
        matches!(
            *method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }

    /// Validate the header for `method`.
    ///
    /// Non-mutating methods always yield `Ok(None)`. For mutating methods a
    /// missing header is an error only under [`IdempotencyPolicy::Required`];
    /// a malformed one is always an error.
    pub fn inspect(
        method: &Method,
        header: Option<&str>,
        policy: IdempotencyPolicy,
    ) -> Result<Option<IdempotencyKey>, GatewayError> {
        if !Self::is_mutating(method) {
            return Ok(None);
        }
        match header {
            Some(raw) => IdempotencyKey::parse(raw).map(Some),
            None if policy == IdempotencyPolicy::Required => {
                Err(GatewayError::IdempotencyKeyRequired)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";

    #[test]
    fn required_header_missing() {
        let err = IdempotencyGuard::inspect(&Method::POST, None, IdempotencyPolicy::Required)
            .unwrap_err();
        assert_eq!(err, GatewayError::IdempotencyKeyRequired);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.kind(), "IDEMPOTENCY_KEY_REQUIRED");
    }

    #[test]
    fn optional_header_missing() {
        assert_eq!(
            IdempotencyGuard::inspect(&Method::PUT, None, IdempotencyPolicy::Optional).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_header_rejected_under_any_policy() {
        for policy in [IdempotencyPolicy::Required, IdempotencyPolicy::Optional] {
            let err = IdempotencyGuard::inspect(&Method::PATCH, Some("abc"), policy).unwrap_err();
            assert_eq!(err.kind(), "INVALID_IDEMPOTENCY_KEY");
        }
    }

    #[test]
    fn valid_header_parsed() {
        let key = IdempotencyGuard::inspect(&Method::DELETE, Some(KEY), IdempotencyPolicy::Required)
            .unwrap()
            .unwrap();
        assert_eq!(key.as_str(), KEY);
    }

    #[test]
    fn read_methods_pass_through() {
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert_eq!(
                IdempotencyGuard::inspect(&method, Some("garbage"), IdempotencyPolicy::Required)
                    .unwrap(),
                None
            );
        }
    }
}
