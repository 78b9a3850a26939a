//! Every adapter turns the same vendor-shaped reply into the same turn.

use scribe_core::message::{Role, Turn};
use scribe_core::provider::{Provider, ProviderRequest};
use scribe_providers::{AnthropicProvider, GeminiProvider, OpenAiCompatProvider};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn request(model: &str) -> ProviderRequest {
    ProviderRequest::new(model, vec![Turn::user("hi")])
        .with_system_prompt(Some("You are terse.".into()))
}

fn assert_hi_there(turn: &Turn) {
    assert_eq!(turn.role, Role::Assistant);
    assert_eq!(turn.text.as_deref(), Some("hi there"));
    assert!(turn.tool_calls.is_empty());
    assert!(turn.tool_results.is_empty());
}

#[tokio::test]
async fn anthropic_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "ant-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "system": "You are terse.",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"msg_1","type":"message","role":"assistant","model":"claude",
                "content":[{"type":"text","text":"hi there"}],
                "stop_reason":"end_turn","usage":{"input_tokens":9,"output_tokens":3}}"#,
        )
        .create_async()
        .await;

    let provider = AnthropicProvider::new("ant-key", TIMEOUT)
        .unwrap()
        .with_base_url(server.url());
    let turn = provider.send(&request("claude-sonnet-4-20250514")).await.unwrap();

    mock.assert_async().await;
    assert_hi_there(&turn);
    assert_eq!(turn.usage.unwrap().input_tokens, 9);
}

#[tokio::test]
async fn openai_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer oai-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"chatcmpl-1","object":"chat.completion","model":"gpt-4o",
                "choices":[{"index":0,"message":{"role":"assistant","content":"hi there"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":11,"completion_tokens":3,"total_tokens":14}}"#,
        )
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new(
        "openai",
        format!("{}/v1", server.url()),
        "oai-key",
        TIMEOUT,
    )
    .unwrap();
    let turn = provider.send(&request("gpt-4o")).await.unwrap();

    mock.assert_async().await;
    assert_hi_there(&turn);
    assert_eq!(turn.usage.unwrap().input_tokens, 11);
}

#[tokio::test]
async fn gemini_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.0-flash:generateContent")
        .match_query(mockito::Matcher::UrlEncoded("key".into(), "gem-key".into()))
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "systemInstruction": {"parts": [{"text": "You are terse."}]},
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hi there"}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":2}}"#,
        )
        .create_async()
        .await;

    let provider = GeminiProvider::new("gem-key", TIMEOUT)
        .unwrap()
        .with_base_url(server.url());
    let turn = provider.send(&request("gemini-2.0-flash")).await.unwrap();

    mock.assert_async().await;
    assert_hi_there(&turn);
    assert_eq!(turn.usage.unwrap().input_tokens, 7);
}

#[tokio::test]
async fn azure_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/deployments/scribe-gpt4o/chat/completions")
        .match_query(mockito::Matcher::UrlEncoded(
            "api-version".into(),
            "2024-06-01".into(),
        ))
        .match_header("api-key", "az-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hi there"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":5,"completion_tokens":2}}"#,
        )
        .create_async()
        .await;

    let provider =
        OpenAiCompatProvider::azure(&server.url(), "scribe-gpt4o", None, "az-key", TIMEOUT).unwrap();
    let turn = provider.send(&request("gpt-4o")).await.unwrap();

    mock.assert_async().await;
    assert_hi_there(&turn);
}

#[tokio::test]
async fn server_error_keeps_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(r#"{"error":{"message":"Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let provider = OpenAiCompatProvider::new(
        "openai",
        format!("{}/v1", server.url()),
        "oai-key",
        TIMEOUT,
    )
    .unwrap();
    let err = provider.send(&request("gpt-4o")).await.unwrap_err();
    assert_eq!(err.status_code(), Some(429));
    assert!(err.body().unwrap().contains("Rate limit exceeded"));
}
