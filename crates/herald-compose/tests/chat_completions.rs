//! Chat completions contract tests.

use herald_compose::{ChatCompletionGenerator, ComposeConfig, ComposeError};
use herald_outreach::{Candidate, ContentGenerator};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn candidate() -> Candidate {
    Candidate::new("did:plc:alice", "alice.test", "Writes about sourdough.")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn generator(server: &MockServer) -> ChatCompletionGenerator {
    let config = ComposeConfig::new(format!("{}/v1", server.uri()), "test-model")
        .with_api_key("test-key")
        .with_system_prompt("be brief");
    ChatCompletionGenerator::new(config)
}

#[tokio::test]
async fn sends_model_prompt_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [{"role": "system", "content": "be brief"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "  Hi Alice! How long has your starter been going?  ",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let text = generator(&server).await.compose(&candidate()).await.unwrap();

    assert_eq!(text, "Hi Alice! How long has your starter been going?");
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = generator(&server)
        .await
        .compose(&candidate())
        .await
        .unwrap_err();

    assert!(matches!(err, ComposeError::Status { status: 503, ref body } if body == "overloaded"));
}

#[tokio::test]
async fn empty_content_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let err = generator(&server)
        .await
        .compose(&candidate())
        .await
        .unwrap_err();

    assert!(matches!(err, ComposeError::EmptyContent));
}

#[tokio::test]
async fn malformed_body_is_generation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = generator(&server)
        .await
        .generate(&candidate())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("content generation failed: invalid response"));
}
