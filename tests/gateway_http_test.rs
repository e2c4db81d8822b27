use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modelgate::cache::{CacheError, CacheStore, MemoryCacheStore};
use modelgate::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";

fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-hidden-123",
        "model": "vendor-secret-model",
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    })
}

fn fast_model() -> ModelEntry {
    ModelEntry::new(InternalModelId::ModelFast, "Fast", 1, 16_000)
        .capability(ModelCapability::TextGeneration)
}

fn settings() -> IdempotencySettings {
    IdempotencySettings {
        poll_interval_ms: 10,
        in_flight_wait_ms: 5_000,
        ..IdempotencySettings::default()
    }
}

fn config(server: &MockServer) -> GatewayConfig {
    GatewayConfig::new()
        .with_provider(
            ProviderEntry::new("provider-alpha")
                .endpoint(format!("{}/v1/chat", server.uri()))
                .api_key("test-key"),
        )
        .with_model(fast_model().map_provider("provider-alpha", "fast-alpha"))
        .with_idempotency(settings())
        .with_retry(RetrySettings::immediate())
}

fn keyed(prompt: &str) -> InboundRequest {
    InboundRequest::post(
        "/v1/generate",
        ModelRequest::new(InternalModelId::ModelFast, prompt),
    )
    .with_idempotency_key(KEY)
}

#[tokio::test]
async fn fails_over_past_provider_without_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .and(header("authorization", "Bearer key-a"))
        .and(body_partial_json(json!({"model": "fast-a"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("from a")))
        .expect(1)
        .mount(&server)
        .await;

    // B is listed first but has no endpoint, so it never makes the directory.
    let config = GatewayConfig::new()
        .with_provider(ProviderEntry::new("provider-bravo").api_key("key-b"))
        .with_provider(
            ProviderEntry::new("provider-alpha")
                .endpoint(format!("{}/v1/chat", server.uri()))
                .api_key("key-a"),
        )
        .with_model(
            fast_model()
                .map_provider("provider-bravo", "fast-b")
                .map_provider("provider-alpha", "fast-a"),
        )
        .with_retry(RetrySettings::immediate());

    let gateway = Gateway::from_config(config).unwrap();
    assert_eq!(gateway.registry().directory().len(), 1);

    let response = gateway
        .send_request(&ModelRequest::new(InternalModelId::ModelFast, "hello"))
        .await
        .unwrap();
    assert_eq!(response.content, "from a");
}

#[tokio::test]
async fn api_key_providers_use_api_key_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/keyed"))
        .and(header("api-key", "secret-2"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("keyed")))
        .expect(1)
        .mount(&server)
        .await;

    let config = GatewayConfig::new()
        .with_provider(
            ProviderEntry::new("provider-keyed")
                .endpoint(format!("{}/v1/keyed", server.uri()))
                .api_key("secret-2")
                .auth_type(AuthType::ApiKey),
        )
        .with_model(fast_model().map_provider("provider-keyed", "fast-k"));

    let gateway = Gateway::from_config(config).unwrap();
    let response = gateway
        .send_request(&ModelRequest::new(InternalModelId::ModelFast, "hi"))
        .await
        .unwrap();
    assert_eq!(response.content, "keyed");
}

#[tokio::test]
async fn translated_payload_carries_defaults() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .and(body_partial_json(json!({
            "model": "fast-alpha",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ],
            "max_tokens": 2048,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();
    let request =
        ModelRequest::new(InternalModelId::ModelFast, "hello").with_system_prompt("be brief");
    gateway.send_request(&request).await.unwrap();
}

#[tokio::test]
async fn responses_never_reveal_provider_identity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("answer")))
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();
    let response = gateway
        .send_request(&ModelRequest::new(InternalModelId::ModelFast, "hello"))
        .await
        .unwrap();

    assert_eq!(response.model, InternalModelId::ModelFast);
    let serialized = serde_json::to_string(&response).unwrap();
    let endpoint = server.uri();
    for leak in [
        "provider-alpha",
        "fast-alpha",
        "vendor-secret-model",
        "chatcmpl-hidden-123",
        endpoint.as_str(),
    ] {
        assert!(!serialized.contains(leak), "response leaked {leak}");
    }
    for id in gateway.registry().directory().ids() {
        assert!(!serialized.contains(id.as_str()));
    }

    let listing = serde_json::to_string(&gateway.list_models()).unwrap();
    assert!(!listing.contains("provider-alpha"));
    assert!(!listing.contains("fast-alpha"));
}

#[tokio::test]
async fn same_key_executes_once_and_replays() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("only once")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();

    let first = gateway.handle(keyed("hello")).await.unwrap();
    let second = gateway.handle(keyed("hello")).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.response, second.response);
    assert_eq!(second.idempotency_key.unwrap().as_str(), KEY);
}

#[tokio::test]
async fn malformed_key_is_rejected_before_dispatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("never")))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();
    let err = gateway
        .handle(keyed("hello").with_idempotency_key("not-a-uuid"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "INVALID_IDEMPOTENCY_KEY");
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn exhausted_timeouts_surface_provider_error_and_cache_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(4)
        .mount(&server)
        .await;

    let config = GatewayConfig::new()
        .with_provider(
            ProviderEntry::new("provider-alpha")
                .endpoint(format!("{}/v1/chat", server.uri()))
                .api_key("test-key")
                .timeout(Duration::from_millis(50))
                .retry_attempts(3),
        )
        .with_model(fast_model().map_provider("provider-alpha", "fast-alpha"))
        .with_idempotency(settings())
        .with_retry(RetrySettings::immediate());

    let cache = Arc::new(MemoryCacheStore::new(64));
    let gateway = Gateway::from_config_with_cache(config, cache.clone()).unwrap();

    let err = gateway.handle(keyed("slow")).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::ProviderError {
            attempts: 4,
            cause: UpstreamFailure::Timeout
        }
    );
    assert_eq!(err.user_message(), "Upstream unavailable, please retry later");
    assert_eq!(cache.get(&format!("idempotency:{KEY}")).await.unwrap(), None);
}

#[tokio::test]
async fn upstream_error_bodies_are_not_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string("invalid key for provider-alpha account"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();
    let err = gateway
        .send_request(&ModelRequest::new(InternalModelId::ModelFast, "hello"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GatewayError::ProviderError {
            attempts: 1,
            cause: UpstreamFailure::Status(401)
        }
    );
    assert!(!err.to_string().contains("provider-alpha"));
    assert!(!err.user_message().contains("provider-alpha"));
}

#[tokio::test]
async fn server_errors_are_retried_on_the_same_provider() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("third time")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();
    let response = gateway
        .send_request(&ModelRequest::new(InternalModelId::ModelFast, "hello"))
        .await
        .unwrap();
    assert_eq!(response.content, "third time");
}

#[tokio::test]
async fn concurrent_same_key_requests_dispatch_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body("shared"))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();

    let replies = futures::future::join_all((0..8).map(|_| gateway.handle(keyed("hello")))).await;

    let replies: Vec<GatewayReply> = replies.into_iter().map(Result::unwrap).collect();
    assert!(replies.iter().all(|r| r.response.content == "shared"));
    assert_eq!(replies.iter().filter(|r| !r.replayed).count(), 1);
}

#[tokio::test]
async fn failed_execution_frees_the_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("second try")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();

    assert!(gateway.handle(keyed("hello")).await.is_err());
    let reply = gateway.handle(keyed("hello")).await.unwrap();
    assert!(!reply.replayed);
    assert_eq!(reply.response.content, "second try");
}

struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unreachable("connection reset".into()))
    }
    async fn set(&self, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
        Err(CacheError::Unreachable("connection reset".into()))
    }
    async fn set_if_absent(&self, _: &str, _: String, _: Duration) -> Result<bool, CacheError> {
        Err(CacheError::Unreachable("connection reset".into()))
    }
    async fn delete(&self, _: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unreachable("connection reset".into()))
    }
    async fn compare_and_set(
        &self,
        _: &str,
        _: &str,
        _: String,
        _: Duration,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Unreachable("connection reset".into()))
    }
    async fn compare_and_delete(&self, _: &str, _: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unreachable("connection reset".into()))
    }
}

#[tokio::test]
async fn cache_outage_fails_open() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("still served")))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config_with_cache(config(&server), Arc::new(BrokenStore)).unwrap();

    let first = gateway.handle(keyed("hello")).await.unwrap();
    let second = gateway.handle(keyed("hello")).await.unwrap();
    assert_eq!(first.response.content, "still served");
    assert!(!first.replayed);
    assert!(!second.replayed);
}

#[tokio::test]
async fn unkeyed_duplicates_are_deduplicated_per_actor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("fp")))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(config(&server)).unwrap();
    let inbound = |actor: &str| {
        InboundRequest::post(
            "/v1/generate",
            ModelRequest::new(InternalModelId::ModelFast, "hello"),
        )
        .with_policy(IdempotencyPolicy::Optional)
        .with_actor(actor)
    };

    assert!(!gateway.handle(inbound("actor-1")).await.unwrap().replayed);
    assert!(gateway.handle(inbound("actor-1")).await.unwrap().replayed);
    assert!(!gateway.handle(inbound("actor-2")).await.unwrap().replayed);
}
