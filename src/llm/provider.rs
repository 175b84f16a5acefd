//! LLM provider abstraction and conversation message model
//!
//! The Completion Client is a black box: a history goes in and one
//! [`AgentReply`] comes out. The adapter classifies the raw provider response
//! exactly once, so everything downstream matches on the variant instead of
//! probing optional fields.

use crate::tools::ToolDescription;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Message roles in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool invocation requested by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Tool invocation the Completion Client rejected before it could be executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text as received from the provider
    pub raw_arguments: String,
    pub error: String,
}

/// Classified agent response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentReply {
    /// Free text with no tool requests
    PlainContent {
        content: String,
        /// True for replies the pipeline wrote itself (e.g. retry notices)
        #[serde(default)]
        synthetic: bool,
    },
    /// One or more well-formed tool requests
    ToolRequests {
        #[serde(default)]
        content: String,
        requests: Vec<ToolCall>,
    },
    /// Tool requests the client refused (malformed or oversized arguments)
    InvalidToolRequests {
        #[serde(default)]
        content: String,
        invalid: Vec<InvalidToolCall>,
    },
}

impl AgentReply {
    /// Plain model output
    pub fn plain<S: Into<String>>(content: S) -> Self {
        Self::PlainContent {
            content: content.into(),
            synthetic: false,
        }
    }

    /// Reply written by the pipeline rather than the model
    pub fn synthetic<S: Into<String>>(content: S) -> Self {
        Self::PlainContent {
            content: content.into(),
            synthetic: true,
        }
    }

    /// Classify a provider response from its parsed parts.
    ///
    /// If any call was rejected, every call in the response is reported as
    /// invalid so that each one is answered by exactly one corrective result.
    pub fn classify(
        content: Option<String>,
        valid: Vec<ToolCall>,
        invalid: Vec<InvalidToolCall>,
    ) -> Self {
        let content = content.unwrap_or_default();

        if !invalid.is_empty() {
            let mut all = invalid;
            all.extend(valid.into_iter().map(|call| InvalidToolCall {
                raw_arguments: call.arguments.to_string(),
                error: "Not executed because another tool call in the same response was invalid"
                    .to_string(),
                id: call.id,
                name: call.name,
            }));
            return Self::InvalidToolRequests {
                content,
                invalid: all,
            };
        }

        if !valid.is_empty() {
            return Self::ToolRequests {
                content,
                requests: valid,
            };
        }

        Self::plain(content)
    }

    /// Text content of the reply
    pub fn content(&self) -> &str {
        match self {
            Self::PlainContent { content, .. }
            | Self::ToolRequests { content, .. }
            | Self::InvalidToolRequests { content, .. } => content,
        }
    }

    /// Valid tool requests, empty for other variants
    pub fn tool_requests(&self) -> &[ToolCall] {
        match self {
            Self::ToolRequests { requests, .. } => requests,
            _ => &[],
        }
    }

    /// Rejected tool requests, empty for other variants
    pub fn invalid_requests(&self) -> &[InvalidToolCall] {
        match self {
            Self::InvalidToolRequests { invalid, .. } => invalid,
            _ => &[],
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::PlainContent { synthetic: true, .. })
    }
}

/// A single entry in a conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        id: Uuid,
        content: String,
    },
    User {
        id: Uuid,
        content: String,
    },
    Assistant {
        id: Uuid,
        reply: AgentReply,
    },
    Tool {
        id: Uuid,
        /// Identifier of the tool request this result answers
        call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::System {
            id: Uuid::new_v4(),
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::User {
            id: Uuid::new_v4(),
            content: content.into(),
        }
    }

    pub fn assistant(reply: AgentReply) -> Self {
        Self::Assistant {
            id: Uuid::new_v4(),
            reply,
        }
    }

    pub fn tool_result<C, N, S>(call_id: C, name: N, content: S) -> Self
    where
        C: Into<String>,
        N: Into<String>,
        S: Into<String>,
    {
        Self::Tool {
            id: Uuid::new_v4(),
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Identity of this message, stable across clones
    pub fn id(&self) -> Uuid {
        match self {
            Self::System { id, .. }
            | Self::User { id, .. }
            | Self::Assistant { id, .. }
            | Self::Tool { id, .. } => *id,
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Self::System { .. } => MessageRole::System,
            Self::User { .. } => MessageRole::User,
            Self::Assistant { .. } => MessageRole::Assistant,
            Self::Tool { .. } => MessageRole::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content, .. }
            | Self::User { content, .. }
            | Self::Tool { content, .. } => content,
            Self::Assistant { reply, .. } => reply.content(),
        }
    }

    /// The classified reply if this is an agent response
    pub fn reply(&self) -> Option<&AgentReply> {
        match self {
            Self::Assistant { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

/// LLM completion request parameters
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub tools: Option<Vec<ToolDescription>>,
    pub tool_choice: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// LLM completion response
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub reply: AgentReply,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
    pub metadata: HashMap<String, String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why completion finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Error,
}

/// LLM provider trait for dependency injection and testing
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai")
    fn name(&self) -> &str;

    /// Get list of available models for this provider
    fn available_models(&self) -> Vec<String>;

    /// Generate a completion from the given request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Check if the provider is configured and ready
    async fn health_check(&self) -> Result<(), LlmError>;
}

/// LLM provider errors
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
}
