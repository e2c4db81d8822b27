//! Request fingerprints
//!
//! SHA-256 over a canonical JSON rendering of
//! `(method, path, body, query, actor)`. Object keys are sorted at every
//! depth so logically equal bodies hash identically.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex-encoded request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint(String);

#[derive(Serialize)]
struct FingerprintInput<'a> {
    method: &'a str,
    path: &'a str,
    body: Value,
    query: &'a BTreeMap<String, String>,
    actor: Option<&'a str>,
}

impl RequestFingerprint {
    pub fn compute(
        method: &str,
        path: &str,
        body: &Value,
        query: &BTreeMap<String, String>,
        actor: Option<&str>,
    ) -> Self {
        let input = FingerprintInput {
            method: &method.to_ascii_uppercase(),
            path,
            body: canonicalize(body.clone()),
            query,
            actor,
        };
        // Serializing plain strings, maps and `Value`s cannot fail.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn cache_key(&self) -> String {
        format!("fingerprint:{}", self.0)
    }
}

impl std::fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
