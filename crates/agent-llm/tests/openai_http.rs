//! HTTP-level tests for the hosted chat-completion backend against a mock server.

use agent_core::{ConversationTurn, ProjectSnapshot};
use agent_llm::{AIProvider, LLMError, OpenAIProvider};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new()
        .with_endpoint(format!("{}/v1/chat/completions", server.uri()))
        .with_api_key("sk-test")
        .without_env_fallback()
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4-turbo-preview",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn contract_payload() -> String {
    json!({
        "summary": "Install and run",
        "changes": [
            { "path": "README.md", "action": "modify", "content": "# Hello" }
        ],
        "commands": [
            { "command": "npm install", "description": "install deps" }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_generate_response_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&contract_payload())))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider_for(&server)
        .generate_response("update readme", &ProjectSnapshot::default())
        .await
        .unwrap();

    assert_eq!(response.summary, "Install and run");
    assert_eq!(response.changes.len(), 1);
    assert_eq!(response.commands().len(), 1);
    assert_eq!(response.commands()[0].command, "npm install");
}

#[tokio::test]
async fn test_request_body_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&contract_payload())))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    provider
        .update_settings(&json!({ "model": "gpt-4o" }))
        .await
        .unwrap();

    let snapshot = ProjectSnapshot {
        recent_history: vec![
            ConversationTurn::user("first"),
            ConversationTurn::assistant("done first"),
        ],
        ..Default::default()
    };
    provider
        .generate_response("second", &snapshot)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();

    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["response_format"]["type"], "json_object");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "first");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[3]["role"], "user");
    assert!(messages[3]["content"]
        .as_str()
        .unwrap()
        .contains("User Instruction: second"));
}

#[tokio::test]
async fn test_missing_api_key_fails_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&contract_payload())))
        .expect(0)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new()
        .with_endpoint(format!("{}/v1/chat/completions", server.uri()))
        .without_env_fallback();

    let err = provider
        .generate_response("x", &ProjectSnapshot::default())
        .await
        .unwrap_err();

    match err {
        LLMError::Config { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("API key is missing"));
        }
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "Incorrect API key" } })),
        )
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .generate_response("x", &ProjectSnapshot::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LLMError::Api { status: 401, .. }));
}

#[tokio::test]
async fn test_empty_choices_is_envelope_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .generate_response("x", &ProjectSnapshot::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LLMError::Envelope { .. }));
}

#[tokio::test]
async fn test_content_violating_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(r#"{"summary": "no changes key"}"#)),
        )
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .generate_response("x", &ProjectSnapshot::default())
        .await
        .unwrap_err();

    assert!(err.is_contract_violation());
}
