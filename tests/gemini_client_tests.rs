//! Gemini client tests against a wiremock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voice_bridge::core::llm::{ChatError, ChatModel, ChatRequest, GeminiClient, GeminiConfig};

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        system_instruction: "پاسخ کوتاه بده".to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn reply_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn test_text_message_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "system_instruction": {"parts": [{"text": "پاسخ کوتاه بده"}]},
            "contents": [{"role": "user", "parts": [{"text": "سلام"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("سلام! خوبی؟")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .generate(ChatRequest::text("سلام"))
        .await
        .unwrap();

    assert_eq!(reply, "سلام! خوبی؟");
}

#[tokio::test]
async fn test_image_is_sent_as_inline_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_partial_json(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": "این چیه؟"},
                    {"inline_data": {"mime_type": "image/png", "data": "AQID"}}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("یک تصویر")))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::text("این چیه؟").with_image(vec![1u8, 2, 3], "image/png");
    let reply = client_for(&server).generate(request).await.unwrap();

    assert_eq!(reply, "یک تصویر");
}

#[tokio::test]
async fn test_api_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(ChatRequest::text("hi"))
        .await
        .unwrap_err();

    match err {
        ChatError::Api { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("API key not valid"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_blocked_prompt_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(ChatRequest::text("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::EmptyResponse));
}

#[tokio::test]
async fn test_garbage_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(ChatRequest::text("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_single_attempt_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate(ChatRequest::text("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Api { status: 503, .. }));
}
