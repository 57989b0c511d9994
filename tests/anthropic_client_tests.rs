//! Anthropic client against a mock Messages endpoint.

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::config::OrchestratorConfig;
use parley::error::OrchestratorError;
use parley::provider::{AnthropicClient, ModelClient, ModelDelta, ModelRequest, StopReason};
use parley::types::Turn;

fn config(server: &MockServer) -> OrchestratorConfig {
    OrchestratorConfig {
        api_key: Some("test-key".into()),
        base_url: Some(format!("{}/v1", server.uri())),
        ..Default::default()
    }
}

fn request() -> ModelRequest {
    ModelRequest {
        model: "claude-sonnet-4-20250514".into(),
        system: Some("be terse".into()),
        turns: vec![Turn::user("What's 2+2?")],
        tools: parley::tools::builtin_definitions(),
        max_tokens: 256,
        temperature: Some(0.3),
    }
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| {
            format!(
                "event: {}\ndata: {}\n\n",
                event["type"].as_str().unwrap_or("message"),
                event
            )
        })
        .collect()
}

#[tokio::test]
async fn streams_text_and_tool_use() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {"id": "msg_1", "usage": {"input_tokens": 21, "output_tokens": 1}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "ping"}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking "}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "the doc."}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "read_file", "input": {}}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"document_"}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "id\": \"doc-1\"}"}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 40}}),
        json!({"type": "message_stop"}),
    ]);

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-20250514",
            "system": "be terse",
            "stream": true,
            "max_tokens": 256,
            "messages": [{"role": "user", "content": "What's 2+2?"}],
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicClient::new(&config(&server)).unwrap();
    let deltas: Vec<_> = client.stream(&request()).await.unwrap().collect().await;

    let texts: Vec<String> = deltas
        .iter()
        .filter_map(|d| match d {
            Ok(ModelDelta::Text(text)) => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["Checking ", "the doc."]);

    let Some(Ok(ModelDelta::Finished(turn))) = deltas.last() else {
        panic!("expected finished turn last, got {deltas:?}");
    };
    assert_eq!(Turn::assistant_parts(turn.content.clone()).text(), "Checking the doc.");
    assert_eq!(turn.stop_reason, Some(StopReason::ToolUse));
    assert_eq!(turn.usage.input_tokens, 21);
    assert_eq!(turn.usage.output_tokens, 40);
    let uses = turn.tool_uses();
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].id, "toolu_9");
    assert_eq!(uses[0].input, json!({"document_id": "doc-1"}));
}

#[tokio::test]
async fn truncated_stream_yields_error() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 3}}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "half"}}),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = AnthropicClient::new(&config(&server)).unwrap();
    let deltas: Vec<_> = client.stream(&request()).await.unwrap().collect().await;

    assert!(matches!(deltas[0], Ok(ModelDelta::Text(ref t)) if t == "half"));
    assert!(matches!(deltas.last(), Some(Err(OrchestratorError::Stream(_)))));
}

#[tokio::test]
async fn error_status_maps_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let client = AnthropicClient::new(&config(&server)).unwrap();
    let err = match client.stream(&request()).await {
        Ok(_) => panic!("expected error"),
        Err(err) => err,
    };
    assert!(matches!(err, OrchestratorError::Authentication(ref m) if m == "invalid x-api-key"));
}

#[tokio::test]
async fn overloaded_error_frame_ends_stream() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {}}),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = AnthropicClient::new(&config(&server)).unwrap();
    let deltas: Vec<_> = client.stream(&request()).await.unwrap().collect().await;
    assert_eq!(deltas.len(), 1);
    assert!(matches!(&deltas[0], Err(OrchestratorError::Stream(m)) if m.contains("Overloaded")));
}
