//! Axum router for the gateway
//!
//! Routes:
//! - `POST /v1/generate`: JSON [`ModelRequest`] in, [`ModelResponse`](crate::types::ModelResponse) out
//! - `GET /v1/models`: provider-free model summaries
//! - `GET /health`
//!
//! Errors render as `{"error": {"code": <kind>, "message": <text>}}` with the
//! error's HTTP status.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use super::{ACTOR_HEADER, IDEMPOTENCY_KEY_HEADER, REPLAY_HEADER};
use crate::error::GatewayError;
use crate::gateway::{Gateway, InboundRequest};
use crate::idempotency::IdempotencyPolicy;
use crate::types::{InternalModelId, ModelRequest};

/// Router behaviour switches.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Key policy for `POST /v1/generate`.
    ///
    /// Default: [`IdempotencyPolicy::Required`]
    pub generate_policy: IdempotencyPolicy,

    /// Whether to mask upstream and internal error messages.
    ///
    /// Client errors always keep their own text.
    /// Default: `true`
    pub mask_errors: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            generate_policy: IdempotencyPolicy::Required,
            mask_errors: true,
        }
    }
}

impl RouterOptions {
    /// Errors are not masked.
    pub fn development() -> Self {
        Self {
            mask_errors: false,
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self::default()
    }

    pub fn with_generate_policy(mut self, policy: IdempotencyPolicy) -> Self {
        self.generate_policy = policy;
        self
    }
}

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    options: Arc<RouterOptions>,
}

/// Build the gateway router.
pub fn router(gateway: Arc<Gateway>, options: RouterOptions) -> Router {
    let state = AppState {
        gateway,
        options: Arc::new(options),
    };
    Router::new()
        .route("/v1/generate", post(generate))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .with_state(state)
}

/// Render an error; `mask` hides upstream and internal detail.
pub fn error_response(error: &GatewayError, mask: bool) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if mask {
        error.user_message()
    } else {
        error.to_string()
    };
    let body = json!({
        "error": {
            "code": error.kind(),
            "message": message,
        }
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        error_response(&self, true)
    }
}

async fn generate(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Response {
    let mask = state.options.mask_errors;
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => return error_response(&error, mask),
    };

    let mut inbound = InboundRequest {
        request,
        method: Method::POST,
        path: uri.path().to_string(),
        query,
        actor: header_str(&headers, ACTOR_HEADER).map(str::to_string),
        idempotency_key: None,
        policy: state.options.generate_policy,
    };
    if let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) {
        // Non-UTF-8 values are handed on as-is so they fail key validation.
        inbound.idempotency_key = Some(String::from_utf8_lossy(raw.as_bytes()).into_owned());
    }

    match state.gateway.handle(inbound).await {
        Ok(reply) => {
            let mut response = Json(&reply.response).into_response();
            if reply.replayed {
                response
                    .headers_mut()
                    .insert(REPLAY_HEADER, HeaderValue::from_static("true"));
            }
            if let Some(key) = reply
                .idempotency_key
                .as_ref()
                .and_then(|k| HeaderValue::from_str(k.as_str()).ok())
            {
                response.headers_mut().insert(IDEMPOTENCY_KEY_HEADER, key);
            }
            response
        }
        Err(error) => {
            if error.status_code() >= 500 {
                tracing::warn!(kind = error.kind(), "generate failed");
            } else {
                tracing::debug!(kind = error.kind(), "generate rejected");
            }
            error_response(&error, mask)
        }
    }
}

async fn list_models(State(state): State<AppState>) -> Response {
    Json(json!({ "models": state.gateway.list_models() })).into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Unknown model ids are reported as `MODEL_NOT_FOUND`, other shape
/// problems as `INVALID_REQUEST`.
fn parse_request(body: &[u8]) -> Result<ModelRequest, GatewayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| GatewayError::InvalidRequest("body is not valid JSON".into()))?;
    if let Some(id) = value.get("internalModelId").and_then(Value::as_str) {
        InternalModelId::from_str(id)?;
    }
    serde_json::from_value(value)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed request: {e}")))
}
