//! OpenAI-compatible provider implementation
//!
//! Speaks the chat-completions wire format, which DeepSeek and most hosted
//! models also accept. Tool calls whose argument text does not parse as a
//! JSON object are surfaced as invalid calls instead of being dropped.

use crate::llm::provider::{
    AgentReply, CompletionRequest, CompletionResponse, FinishReason, InvalidToolCall, LlmError,
    LlmProvider, Message, TokenUsage, ToolCall as ProviderToolCall,
};
use crate::tools::ToolDescription;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default endpoint for the developer model
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OpenAI-compatible API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Estimate token count for messages (pure function)
    fn estimate_token_count(messages: &[OpenAiMessage]) -> usize {
        messages
            .iter()
            .map(|m| m.content.as_ref().map(|c| c.len()).unwrap_or(0) / 4)
            .sum()
    }

    /// Parse OpenAI completion response (pure function)
    fn parse_completion_response(
        openai_response: OpenAiCompletionResponse,
        request_metadata: std::collections::HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let Some(choice) = openai_response.choices.into_iter().next() else {
            return Err(LlmError::InvalidResponse(
                "No choices returned from provider".to_string(),
            ));
        };

        let usage = openai_response
            .usage
            .map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            })
            .unwrap_or_default();

        let truncated = choice.finish_reason.as_deref() == Some("length");
        let (valid, invalid) = choice
            .message
            .tool_calls
            .as_deref()
            .map(|calls| Self::extract_tool_calls(calls, truncated))
            .unwrap_or_default();

        let finish_reason = Self::convert_finish_reason_pure(choice.finish_reason);

        Ok(CompletionResponse {
            reply: AgentReply::classify(choice.message.content, valid, invalid),
            model: openai_response.model,
            usage,
            finish_reason,
            metadata: request_metadata,
        })
    }

    /// Split tool calls into well-formed and rejected ones (pure function)
    fn extract_tool_calls(
        calls: &[OpenAiToolCall],
        truncated: bool,
    ) -> (Vec<ProviderToolCall>, Vec<InvalidToolCall>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for call in calls {
            let raw = call.function.arguments.trim();
            let parsed = if raw.is_empty() {
                Ok(serde_json::Value::Object(serde_json::Map::new()))
            } else {
                serde_json::from_str::<serde_json::Value>(raw)
            };

            match parsed {
                Ok(args) if args.is_object() => valid.push(ProviderToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: args,
                }),
                Ok(_) => invalid.push(InvalidToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    raw_arguments: call.function.arguments.clone(),
                    error: "Tool arguments must be a JSON object".to_string(),
                }),
                Err(e) => {
                    warn!(
                        tool = %call.function.name,
                        call_id = %call.id,
                        argument_bytes = call.function.arguments.len(),
                        "Failed to parse tool call arguments: {}",
                        e
                    );
                    let error = if truncated {
                        format!("Arguments were cut off at the output token limit: {e}")
                    } else {
                        format!("Arguments are not valid JSON: {e}")
                    };
                    invalid.push(InvalidToolCall {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        raw_arguments: call.function.arguments.clone(),
                        error,
                    });
                }
            }
        }

        (valid, invalid)
    }

    /// Convert OpenAI finish reason to internal format (pure function)
    fn convert_finish_reason_pure(reason: Option<String>) -> FinishReason {
        match reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }

    /// Convert internal message to OpenAI format (pure function)
    fn convert_message(message: &Message) -> OpenAiMessage {
        match message {
            Message::System { content, .. } => OpenAiMessage::text("system", content),
            Message::User { content, .. } => OpenAiMessage::text("user", content),
            Message::Tool {
                call_id, content, ..
            } => OpenAiMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
            Message::Assistant { reply, .. } => {
                let tool_calls: Vec<OpenAiToolCall> = match reply {
                    AgentReply::PlainContent { .. } => Vec::new(),
                    AgentReply::ToolRequests { requests, .. } => requests
                        .iter()
                        .map(|call| {
                            OpenAiToolCall::function(&call.id, &call.name, call.arguments.to_string())
                        })
                        .collect(),
                    AgentReply::InvalidToolRequests { invalid, .. } => invalid
                        .iter()
                        .map(|call| {
                            OpenAiToolCall::function(&call.id, &call.name, call.raw_arguments.clone())
                        })
                        .collect(),
                };

                let content = reply.content();
                OpenAiMessage {
                    role: "assistant".to_string(),
                    content: if content.is_empty() && !tool_calls.is_empty() {
                        None
                    } else {
                        Some(content.to_string())
                    },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: None,
                }
            }
        }
    }

    /// Convert tool description to OpenAI tool format (pure function)
    fn convert_tool(tool_desc: &ToolDescription) -> OpenAiTool {
        OpenAiTool {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool_desc.name.clone(),
                description: tool_desc.description.clone(),
                parameters: tool_desc.parameters.clone(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn available_models(&self) -> Vec<String> {
        vec![
            "deepseek-chat".to_string(),
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4.1".to_string(),
        ]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let messages: Vec<OpenAiMessage> =
            request.messages.iter().map(Self::convert_message).collect();

        let tools = request
            .tools
            .as_ref()
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.iter().map(Self::convert_tool).collect());

        let estimated_tokens = Self::estimate_token_count(&messages);
        self.log_request_info(&messages, estimated_tokens);

        let openai_request = OpenAiCompletionRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice: request.tool_choice.clone(),
        };

        self.complete_with_retry(openai_request, request.metadata)
            .await
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::AuthenticationFailed(
                "Provider API authentication failed".to_string(),
            ))
        }
    }
}

impl OpenAiProvider {
    /// Log request information (impure)
    fn log_request_info(&self, messages: &[OpenAiMessage], estimated_tokens: usize) {
        debug!(
            "Completion request: {} messages, estimated ~{} tokens",
            messages.len(),
            estimated_tokens
        );

        if estimated_tokens > 120000 {
            warn!(
                "Large request detected: estimated {} tokens, may exceed model limits",
                estimated_tokens
            );
        }
    }

    /// Retry orchestrator - handles only I/O and retry logic (impure)
    async fn complete_with_retry(
        &self,
        openai_request: OpenAiCompletionRequest,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let backoff_delays = [100u64, 200, 300];
        let mut last_error = None;

        for (attempt, &delay_ms) in std::iter::once(&0u64)
            .chain(backoff_delays.iter())
            .enumerate()
        {
            if attempt > 0 {
                debug!("Completion retry attempt {} after {}ms delay", attempt, delay_ms);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(&openai_request).await {
                Ok(openai_response) => {
                    if attempt > 0 {
                        debug!("Completion request succeeded after {} retries", attempt);
                    }
                    let response = Self::parse_completion_response(openai_response, metadata)?;
                    self.log_response_info(&response);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Completion request attempt {} failed: {}", attempt + 1, e);
                    if !Self::should_retry(&e) {
                        error!("Non-retryable provider error, aborting: {}", e);
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!("Completion request failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    /// Make single API request (impure I/O)
    async fn make_api_request(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<OpenAiCompletionResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(openai_request)
            .send()
            .await
            .map_err(|e| {
                let error_msg = format!(
                    "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                );
                warn!("Provider network error details: {}", error_msg);
                LlmError::NetworkError(error_msg)
            })?;

        let status = response.status();

        if status.is_server_error() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "Provider server error: {status} - {error_text}"
            )));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LlmError::AuthenticationFailed(format!(
                "Provider rejected credentials: {status}"
            )));
        }

        if status.as_u16() == 429 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimitExceeded(error_text));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Provider client error - Status: {}, Response: {}",
                status, error_text
            );

            if error_text.contains("maximum context length")
                || error_text.contains("too many tokens")
            {
                warn!("Token limit exceeded - conversation may be too long");
            }

            return Err(LlmError::ApiError(format!(
                "Provider API error: {status} - {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    /// Check if error should trigger retry (pure)
    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::NetworkError(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            _ => false,
        }
    }

    /// Log response information (impure)
    fn log_response_info(&self, response: &CompletionResponse) {
        debug!(
            "Completion response: {} tokens used (prompt: {}, completion: {}), finish_reason: {:?}, tool_calls: {}, invalid_tool_calls: {}",
            response.usage.total_tokens,
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.finish_reason,
            response.reply.tool_requests().len(),
            response.reply.invalid_requests().len()
        );
    }
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "default_call_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl OpenAiToolCall {
    fn function(id: &str, name: &str, arguments: String) -> Self {
        Self {
            id: id.to_string(),
            call_type: default_call_type(),
            function: OpenAiFunctionCall {
                name: name.to_string(),
                arguments,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
