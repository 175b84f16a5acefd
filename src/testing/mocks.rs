//! Mock implementations for testing
//!
//! `ScriptedLlmProvider` plays back a fixed sequence of agent replies and
//! records every request it receives, so pipeline runs can be driven without
//! a real model.

use crate::llm::provider::{
    AgentReply, CompletionRequest, CompletionResponse, FinishReason, InvalidToolCall, LlmError,
    LlmProvider, TokenUsage, ToolCall,
};
use crate::tools::{NEXT_TASK_TOOL, WRITE_FILE_TOOL};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Completion Client that replays scripted replies in order
#[derive(Debug, Default)]
pub struct ScriptedLlmProvider {
    script: Mutex<VecDeque<Result<AgentReply, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmProvider {
    pub fn new(script: Vec<Result<AgentReply, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script made only of successful replies
    pub fn replies(replies: Vec<AgentReply>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// Every request received so far
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Scripted replies not yet consumed
    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    /// Once the script runs out the agent behaves cooperatively and signals
    /// `next_task`, so a run always terminates.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let turn = {
            let mut requests = self.requests.lock().await;
            requests.push(request.clone());
            requests.len()
        };

        let reply = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(next_task_reply(&format!("auto_{turn}"))))?;

        let finish_reason = if reply.tool_requests().is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };

        Ok(CompletionResponse {
            reply,
            model: request.model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Build a tool call
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// Reply requesting the given calls
pub fn tool_reply(calls: Vec<ToolCall>) -> AgentReply {
    AgentReply::ToolRequests {
        content: String::new(),
        requests: calls,
    }
}

/// Reply requesting a single write_file
pub fn write_file_reply(id: &str, path: &str, content: &str) -> AgentReply {
    tool_reply(vec![tool_call(
        id,
        WRITE_FILE_TOOL,
        json!({"path": path, "content": content}),
    )])
}

/// Reply signalling task completion
pub fn next_task_reply(id: &str) -> AgentReply {
    tool_reply(vec![tool_call(id, NEXT_TASK_TOOL, json!({}))])
}

/// Reply whose single call the client rejected
pub fn invalid_reply(id: &str, name: &str, error: &str) -> AgentReply {
    AgentReply::InvalidToolRequests {
        content: String::new(),
        invalid: vec![InvalidToolCall {
            id: id.to_string(),
            name: name.to_string(),
            raw_arguments: "{\"path\": \"index.html\", \"content\": \"".to_string(),
            error: error.to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("hi")],
            model: "mock-model".to_string(),
            max_tokens: None,
            temperature: None,
            tools: None,
            tool_choice: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_script_plays_in_order_then_signals_next_task() {
        let provider = ScriptedLlmProvider::new(vec![
            Ok(AgentReply::plain("one")),
            Err(LlmError::NetworkError("down".to_string())),
        ]);

        let first = provider.complete(request()).await.unwrap();
        assert_eq!(first.reply.content(), "one");
        assert!(provider.complete(request()).await.is_err());

        let fallback = provider.complete(request()).await.unwrap();
        assert_eq!(fallback.reply.tool_requests()[0].name, NEXT_TASK_TOOL);
        assert_eq!(provider.call_count().await, 3);
        assert_eq!(provider.remaining().await, 0);
    }

    #[test]
    fn test_reply_builders() {
        let reply = write_file_reply("c1", "index.html", "<html>");
        assert_eq!(reply.tool_requests()[0].arguments["path"], "index.html");

        let invalid = invalid_reply("c2", "write_file", "too big");
        assert_eq!(invalid.invalid_requests()[0].error, "too big");
    }
}
