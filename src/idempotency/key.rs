//! Idempotency keys: client-supplied UUID v4 strings.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::GatewayError;

lazy_static::lazy_static! {
    static ref UUID_V4: Regex = Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$"
    )
    .expect("static UUID v4 pattern");
}

/// Validated idempotency key, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Parse a header value. The whole string must be the key; padding is rejected.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        if UUID_V4.is_match(raw) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(GatewayError::InvalidIdempotencyKey)
        }
    }

    /// Fresh random key.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn cache_key(&self) -> String {
        format!("idempotency:{}", self.0)
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IdempotencyKey {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check a raw header value without keeping the parsed key.
pub fn validate_idempotency_key(raw: &str) -> Result<(), GatewayError> {
    IdempotencyKey::parse(raw).map(|_| ())
}

pub fn is_valid_idempotency_key(raw: &str) -> bool {
    validate_idempotency_key(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_v4_any_case() {
        let key = IdempotencyKey::parse("A1B2C3D4-E5F6-4A7B-8C9D-0E1F2A3B4C5D").unwrap();
        assert_eq!(key.as_str(), "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d");
        assert!(is_valid_idempotency_key("a1b2c3d4-e5f6-4a7b-9c9d-0e1f2a3b4c5d"));
    }

    #[test]
    fn rejects_non_v4() {
        let bad = [
            "",
            "not-a-uuid",
            // version 1
            "a1b2c3d4-e5f6-1a7b-8c9d-0e1f2a3b4c5d",
            // wrong variant nibble
            "a1b2c3d4-e5f6-4a7b-cc9d-0e1f2a3b4c5d",
            "a1b2c3d4e5f64a7b8c9d0e1f2a3b4c5d",
            "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d-extra",
            "g1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d",
            " a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d",
            "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d ",
            "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d\n",
            " a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d\n",
        ];
        for raw in bad {
            assert_eq!(
                IdempotencyKey::parse(raw),
                Err(GatewayError::InvalidIdempotencyKey),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn generated_keys_validate() {
        for _ in 0..32 {
            let key = IdempotencyKey::generate();
            assert!(is_valid_idempotency_key(key.as_str()));
        }
        assert_ne!(IdempotencyKey::generate(), IdempotencyKey::generate());
    }
}
