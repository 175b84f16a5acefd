//! Integration tests for the OpenAI-compatible Completion Client
//!
//! Tests behavioral contracts against a mock HTTP server:
//! - reply classification (plain, tool requests, invalid tool requests)
//! - wire format of histories carrying tool calls and results
//! - error mapping and retry on server errors

use sitewright::llm::provider::{
    AgentReply, CompletionRequest, FinishReason, LlmError, LlmProvider, Message, ToolCall,
};
use sitewright::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn test_request(messages: Vec<Message>) -> CompletionRequest {
    CompletionRequest {
        messages,
        model: "deepseek-chat".to_string(),
        max_tokens: Some(100),
        temperature: Some(0.2),
        tools: None,
        tool_choice: None,
        metadata: HashMap::new(),
    }
}

fn completion_body(message: serde_json::Value, finish_reason: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": "deepseek-chat",
        "choices": [
            {
                "index": 0,
                "message": message,
                "finish_reason": finish_reason
            }
        ],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 15,
            "total_tokens": 25
        }
    })
}

async fn mount_completion(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_plain_reply_is_classified_as_plain_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            json!({"role": "assistant", "content": "Planning the layout first."}),
            "stop",
        )))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider
        .complete(test_request(vec![Message::user("Build it")]))
        .await
        .unwrap();

    assert_eq!(response.reply, AgentReply::plain("Planning the layout first."));
    assert_eq!(response.model, "deepseek-chat");
    assert_eq!(response.usage.total_tokens, 25);
    assert!(matches!(response.finish_reason, FinishReason::Stop));
}

#[tokio::test]
async fn test_tool_calls_are_classified_as_tool_requests() {
    let mock_server = MockServer::start().await;
    mount_completion(
        &mock_server,
        completion_body(
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "write_file",
                            "arguments": "{\"path\": \"index.html\", \"content\": \"<html></html>\"}"
                        }
                    },
                    {
                        "id": "call_2",
                        "type": "function",
                        "function": { "name": "next_task", "arguments": "{}" }
                    }
                ]
            }),
            "tool_calls",
        ),
    )
    .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider
        .complete(test_request(vec![Message::user("Build it")]))
        .await
        .unwrap();

    let requests = response.reply.tool_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].name, "write_file");
    assert_eq!(requests[0].arguments["path"], "index.html");
    assert_eq!(requests[1].name, "next_task");
    assert!(matches!(response.finish_reason, FinishReason::ToolCalls));
}

#[tokio::test]
async fn test_malformed_arguments_mark_every_call_invalid() {
    let mock_server = MockServer::start().await;
    mount_completion(
        &mock_server,
        completion_body(
            json!({
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {
                        "id": "call_ok",
                        "type": "function",
                        "function": { "name": "list_files", "arguments": "{\"path\": \".\"}" }
                    },
                    {
                        "id": "call_bad",
                        "type": "function",
                        "function": {
                            "name": "write_file",
                            "arguments": "{\"path\": \"index.html\", \"content\": \"<!DOCTYPE"
                        }
                    }
                ]
            }),
            "length",
        ),
    )
    .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider
        .complete(test_request(vec![Message::user("Build it")]))
        .await
        .unwrap();

    assert!(response.reply.tool_requests().is_empty());
    let invalid = response.reply.invalid_requests();
    assert_eq!(invalid.len(), 2);

    let bad = invalid.iter().find(|c| c.id == "call_bad").unwrap();
    assert!(bad.error.contains("output token limit"));
    assert!(bad.raw_arguments.starts_with("{\"path\""));

    let sibling = invalid.iter().find(|c| c.id == "call_ok").unwrap();
    assert!(sibling.error.contains("Not executed"));
    assert!(matches!(response.finish_reason, FinishReason::Length));
}

#[tokio::test]
async fn test_history_with_tool_results_uses_wire_format() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "task"},
                {
                    "role": "assistant",
                    "tool_calls": [
                        {
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "list_files", "arguments": "{\"path\":\".\"}"}
                        }
                    ]
                },
                {"role": "tool", "tool_call_id": "call_1", "content": "[FILE] index.html"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            json!({"role": "assistant", "content": "Seen it"}),
            "stop",
        )))
        .mount(&mock_server)
        .await;

    let history = vec![
        Message::system("sys"),
        Message::user("task"),
        Message::assistant(AgentReply::ToolRequests {
            content: String::new(),
            requests: vec![ToolCall {
                id: "call_1".to_string(),
                name: "list_files".to_string(),
                arguments: json!({"path": "."}),
            }],
        }),
        Message::tool_result("call_1", "list_files", "[FILE] index.html"),
    ];

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request(history)).await.unwrap();
    assert_eq!(response.reply.content(), "Seen it");
}

#[tokio::test]
async fn test_401_maps_to_authentication_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request(vec![Message::user("hi")])).await;

    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_429_maps_to_rate_limit_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request(vec![Message::user("hi")])).await;

    match result {
        Err(LlmError::RateLimitExceeded(body)) => assert_eq!(body, "slow down"),
        other => panic!("Expected RateLimitExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service temporarily unavailable"))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    mount_completion(
        &mock_server,
        completion_body(json!({"role": "assistant", "content": "Success after retry"}), "stop"),
    )
    .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider
        .complete(test_request(vec![Message::user("hi")]))
        .await
        .unwrap();

    assert_eq!(response.reply.content(), "Success after retry");
}

#[tokio::test]
async fn test_fails_after_all_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service unavailable"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request(vec![Message::user("hi")])).await;

    assert!(matches!(result, Err(LlmError::ApiError(msg)) if msg.contains("server error")));
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let mock_server = MockServer::start().await;
    mount_completion(
        &mock_server,
        json!({"model": "deepseek-chat", "choices": [], "usage": null}),
    )
    .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request(vec![Message::user("hi")])).await;

    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_metadata_is_preserved() {
    let mock_server = MockServer::start().await;
    mount_completion(
        &mock_server,
        completion_body(json!({"role": "assistant", "content": "ok"}), "stop"),
    )
    .await;

    let mut request = test_request(vec![Message::user("hi")]);
    request
        .metadata
        .insert("task_id".to_string(), "T1".to_string());

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(request).await.unwrap();

    assert_eq!(response.metadata.get("task_id").map(String::as_str), Some("T1"));
}

#[tokio::test]
async fn test_health_check_uses_models_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.health_check().await.is_ok());
}
