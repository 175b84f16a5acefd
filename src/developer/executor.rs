//! Task executor
//!
//! Runs one agent turn for the active task. The executor reads the history
//! but never changes it; it returns the messages the turn produced and the
//! controller appends them.

use crate::config::{BuilderConfig, DEFAULT_MAX_TOOL_CONTENT_CHARS};
use crate::developer::history::ConversationHistory;
use crate::developer::{prompts, Task};
use crate::error::sanitize_error_message;
use crate::llm::{AgentReply, CompletionRequest, LlmProvider, Message};
use crate::tools::ToolDescription;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Model parameters for developer turns
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Advisory per-call budget stated to the agent
    pub max_tool_content_chars: usize,
}

impl ExecutorSettings {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
            max_tool_content_chars: DEFAULT_MAX_TOOL_CONTENT_CHARS,
        }
    }

    pub fn from_config(config: &BuilderConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            max_tool_content_chars: config.pipeline.max_tool_content_chars,
        }
    }
}

/// What the executor needs to know about the active task
#[derive(Debug, Clone, Copy)]
pub struct TurnInput<'a> {
    pub history: &'a ConversationHistory,
    pub task: &'a Task,
    pub project_context: Option<&'a str>,
    /// Whether this task's instruction is already in the history
    pub instruction_sent: bool,
}

/// Drives single agent turns against a Completion Client
pub struct TaskExecutor {
    provider: Arc<dyn LlmProvider>,
    tools: Vec<ToolDescription>,
    settings: ExecutorSettings,
}

impl TaskExecutor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Vec<ToolDescription>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Run one turn and return the messages to append.
    ///
    /// The returned delta always ends with exactly one agent reply. A failed
    /// completion call yields a synthetic retry reply instead of an error.
    #[instrument(skip_all, fields(task_id = %input.task.id, instruction_sent = input.instruction_sent))]
    pub async fn execute_turn(&self, input: TurnInput<'_>) -> Vec<Message> {
        let mut delta = self.prepare_turn(&input);

        let mut messages = Vec::with_capacity(input.history.len() + delta.len());
        messages.extend_from_slice(input.history.messages());
        messages.extend(delta.iter().cloned());

        let reply = match self.provider.complete(self.build_request(messages)).await {
            Ok(response) => {
                debug!(
                    tool_requests = response.reply.tool_requests().len(),
                    invalid_requests = response.reply.invalid_requests().len(),
                    "Agent replied"
                );
                response.reply
            }
            Err(e) => {
                warn!("Completion call failed, asking agent to retry: {}", e);
                AgentReply::synthetic(prompts::retry_notice(&sanitize_error_message(
                    &e.to_string(),
                )))
            }
        };

        delta.push(Message::assistant(reply));
        delta
    }

    /// Messages that must precede the completion call (pure function)
    fn prepare_turn(&self, input: &TurnInput<'_>) -> Vec<Message> {
        let budget = self.settings.max_tool_content_chars;

        if !input.instruction_sent {
            info!(task_id = %input.task.id, "Sending task instruction");
            return vec![Message::user(prompts::task_instruction(
                input.task,
                input.project_context,
                budget,
            ))];
        }

        let invalid = input
            .history
            .last()
            .and_then(Message::reply)
            .map(AgentReply::invalid_requests)
            .unwrap_or_default();

        if !invalid.is_empty() {
            warn!(
                count = invalid.len(),
                "Answering rejected tool calls with corrective results"
            );
        }

        invalid
            .iter()
            .map(|call| {
                Message::tool_result(
                    &call.id,
                    &call.name,
                    prompts::corrective_result(&call.error, budget),
                )
            })
            .collect()
    }

    fn build_request(&self, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            messages,
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: Some(self.tools.clone()),
            tool_choice: None,
            metadata: HashMap::new(),
        }
    }
}
