use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Anonymized provider identifier: lowercase hex SHA-256 of the real provider name.
///
/// The pre-image is never stored; only [`ProviderId::from_name`] ever sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    /// Hash a real provider name. The caller is expected to drop the name afterwards.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for internal diagnostics.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the credential is presented to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// `Authorization: Bearer <credential>`
    #[default]
    Bearer,
    /// `api-key: <credential>`
    #[serde(alias = "api-key")]
    ApiKey,
    /// OAuth access token, sent as a bearer token.
    #[serde(rename = "oauth")]
    OAuth,
}

/// A usable provider entry in the directory.
#[derive(Debug)]
pub struct ProviderConfig {
    pub provider_id: ProviderId,
    pub endpoint: reqwest::Url,
    pub auth_type: AuthType,
    pub credential: SecretString,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry_attempts: u32,
}

impl ProviderConfig {
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
}
