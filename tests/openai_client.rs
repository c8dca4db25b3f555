//! Embedding and generation clients against a fake OpenAI-compatible server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use passage::config::LlmConfig;
use passage::embedding::{Embedder, OpenAIEmbedder};
use passage::error::ErrorKind;
use passage::generation::{ChatMessage, Generator, OpenAIGenerator};
use passage::openai::OpenAIHttp;

/// What the fake server answers with.
#[derive(Clone, Copy)]
enum Mode {
    Ok,
    BadRequest,
    RateLimited,
    ServerError,
    Malformed,
    NullContent,
    Slow,
}

#[derive(Clone)]
struct FakeState {
    mode: Mode,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn fake_embeddings(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    *state.last_body.lock().unwrap() = Some(body);
    if let Some(resp) = common_failure(state.mode, &headers).await {
        return resp;
    }
    Json(json!({
        "object": "list",
        "data": [{ "object": "embedding", "index": 0, "embedding": [0.25, -0.5, 1.0] }],
        "model": "text-embedding-3-small"
    }))
    .into_response()
}

async fn fake_chat(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    *state.last_body.lock().unwrap() = Some(body);
    if let Some(resp) = common_failure(state.mode, &headers).await {
        return resp;
    }
    let content = match state.mode {
        Mode::NullContent => Value::Null,
        _ => json!("Paris."),
    };
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    }))
    .into_response()
}

async fn common_failure(mode: Mode, headers: &HeaderMap) -> Option<Response> {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer sk-test");
    if !authorized {
        return Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Incorrect API key provided" } })),
            )
                .into_response(),
        );
    }
    match mode {
        Mode::BadRequest => Some(
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "message": "model not found", "type": "invalid_request_error" } })),
            )
                .into_response(),
        ),
        Mode::RateLimited => Some((StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()),
        Mode::ServerError => Some((StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()),
        Mode::Malformed => Some((StatusCode::OK, "this is not json").into_response()),
        Mode::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            None
        }
        Mode::Ok | Mode::NullContent => None,
    }
}

struct Fake {
    config: LlmConfig,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn spawn_fake(mode: Mode) -> Fake {
    let last_body = Arc::new(Mutex::new(None));
    let state = FakeState {
        mode,
        last_body: last_body.clone(),
    };
    let app = Router::new()
        .route("/v1/embeddings", post(fake_embeddings))
        .route("/v1/chat/completions", post(fake_chat))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Fake {
        config: LlmConfig {
            base_url: format!("http://{}/v1/", addr),
            api_key: Some("sk-test".to_string()),
            dims: 3,
            timeout_secs: 1,
            ..LlmConfig::default()
        },
        last_body,
    }
}

fn embedder(config: &LlmConfig) -> OpenAIEmbedder {
    OpenAIEmbedder::new(OpenAIHttp::new(config).unwrap(), config)
}

fn generator(config: &LlmConfig) -> OpenAIGenerator {
    OpenAIGenerator::new(OpenAIHttp::new(config).unwrap(), config)
}

#[tokio::test]
async fn test_embed_success_and_request_shape() {
    let fake = spawn_fake(Mode::Ok).await;
    let vector = embedder(&fake.config).embed("hello world").await.unwrap();
    assert_eq!(vector, vec![0.25, -0.5, 1.0]);

    let body = fake.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "text-embedding-3-small");
    assert_eq!(body["input"], json!(["hello world"]));
}

#[tokio::test]
async fn test_embed_wrong_dimensions_is_rejected() {
    let mut fake = spawn_fake(Mode::Ok).await;
    fake.config.dims = 1536;
    let err = embedder(&fake.config).embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    assert!(err.to_string().contains("returned 3 dimensions, expected 1536"));
}

#[tokio::test]
async fn test_embed_rejected_carries_provider_message() {
    let fake = spawn_fake(Mode::BadRequest).await;
    let err = embedder(&fake.config).embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    assert!(err.to_string().contains("model not found"));
}

#[tokio::test]
async fn test_embed_wrong_key_is_rejected() {
    let mut fake = spawn_fake(Mode::Ok).await;
    fake.config.api_key = Some("sk-wrong".to_string());
    let err = embedder(&fake.config).embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_rate_limit_and_server_errors_are_transient() {
    for mode in [Mode::RateLimited, Mode::ServerError] {
        let fake = spawn_fake(mode).await;
        let err = embedder(&fake.config).embed("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
    }
}

#[tokio::test]
async fn test_malformed_body_is_transient() {
    let fake = spawn_fake(Mode::Malformed).await;
    let err = embedder(&fake.config).embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
    assert!(err.to_string().contains("malformed response"));
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let fake = spawn_fake(Mode::Slow).await;
    let err = embedder(&fake.config).embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = LlmConfig {
        base_url: format!("http://{}/v1", addr),
        api_key: Some("sk-test".to_string()),
        ..LlmConfig::default()
    };
    let err = embedder(&config).embed("hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

    let err = generator(&config)
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
}

#[tokio::test]
async fn test_chat_completion_success_and_request_shape() {
    let fake = spawn_fake(Mode::Ok).await;
    let messages = [
        ChatMessage::system("Use only the context."),
        ChatMessage::user("Context:\nThe capital of France is Paris.\n\nQuestion: Capital?"),
    ];
    let text = generator(&fake.config).complete(&messages).await.unwrap();
    assert_eq!(text, "Paris.");

    let body = fake.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_without_content_is_transient() {
    let fake = spawn_fake(Mode::NullContent).await;
    let err = generator(&fake.config)
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
}

#[tokio::test]
async fn test_chat_server_error_is_transient() {
    let fake = spawn_fake(Mode::ServerError).await;
    let err = generator(&fake.config)
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
}
