//! Provider request headers
//!
//! Builds the header set for a provider call from its [`AuthType`].

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use secrecy::ExposeSecret;

use crate::error::GatewayError;
use crate::types::{AuthType, ProviderConfig};

/// Header carrying the credential for [`AuthType::ApiKey`] providers.
pub const API_KEY_HEADER: &str = "api-key";

const GATEWAY_USER_AGENT: &str = concat!("modelgate/", env!("CARGO_PKG_VERSION"));

/// HTTP header builder for provider requests
pub struct HttpHeaderBuilder {
    headers: HeaderMap,
}

impl HttpHeaderBuilder {
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
        }
    }

    /// Add Bearer token authorization
    pub fn with_bearer_auth(mut self, token: &str) -> Result<Self, GatewayError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| GatewayError::Config("credential is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Add custom authorization header (e.g. `api-key`)
    pub fn with_custom_auth(mut self, header_name: &str, value: &str) -> Result<Self, GatewayError> {
        let name = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| GatewayError::Config(format!("invalid header name '{header_name}': {e}")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| GatewayError::Config("credential is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add JSON content type
    pub fn with_json_content_type(mut self) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    pub fn with_gateway_user_agent(mut self) -> Self {
        self.headers
            .insert(USER_AGENT, HeaderValue::from_static(GATEWAY_USER_AGENT));
        self
    }

    /// Add the credential the way `auth_type` expects it.
    pub fn with_provider_auth(self, provider: &ProviderConfig) -> Result<Self, GatewayError> {
        let credential = provider.credential.expose_secret();
        match provider.auth_type {
            // OAuth tokens are already-issued access tokens.
            AuthType::Bearer | AuthType::OAuth => self.with_bearer_auth(credential),
            AuthType::ApiKey => self.with_custom_auth(API_KEY_HEADER, credential),
        }
    }

    pub fn build(self) -> HeaderMap {
        self.headers
    }
}

impl Default for HttpHeaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Full header set for a provider call.
pub fn provider_headers(provider: &ProviderConfig) -> Result<HeaderMap, GatewayError> {
    Ok(HttpHeaderBuilder::new()
        .with_json_content_type()
        .with_gateway_user_agent()
        .with_provider_auth(provider)?
        .build())
}
