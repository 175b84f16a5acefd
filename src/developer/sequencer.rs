//! Task sequencer
//!
//! Owns the task list, the cursor and the pipeline status. Advancing to the
//! next task replaces the conversation with the System message plus a single
//! context message summarizing what the finished task produced.

use crate::developer::history::ConversationHistory;
use crate::developer::{prompts, PipelineStatus, Task, TaskList};
use crate::error::sanitize_error_message;
use crate::llm::{AgentReply, Message};
use crate::tools::WRITE_FILE_TOOL;
use thiserror::Error;
use tracing::{debug, error, info};

/// Summary used when the finished task left no usable agent text
pub const FALLBACK_SUMMARY: &str = "Task completed";

/// Failures while building the next task's context
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SequencingError {
    #[error("conversation history does not start with the system message")]
    MissingSystemMessage,
    #[error("cursor {cursor} is outside the task list of {len} tasks")]
    CursorOutOfRange { cursor: usize, len: usize },
}

/// Result of an advance transition
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The last task finished; history is left as is
    Finished,
    /// Moved to the next task; history must be replaced
    NextTask {
        history: Vec<Message>,
        project_context: String,
    },
    /// Sequencing failed; history must be replaced with the error report
    Failed { history: Vec<Message>, report: String },
}

#[derive(Debug, Clone)]
pub struct TaskSequencer {
    tasks: TaskList,
    cursor: usize,
    status: PipelineStatus,
    project_name: String,
}

impl TaskSequencer {
    pub fn new<S: Into<String>>(tasks: TaskList, project_name: S) -> Self {
        Self {
            tasks,
            cursor: 0,
            status: PipelineStatus::InProgress,
            project_name: project_name.into(),
        }
    }

    /// Start from an upstream status, e.g. `Error` after a failed plan parse
    pub fn with_status(mut self, status: PipelineStatus) -> Self {
        self.status = status;
        self
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.cursor)
    }

    /// True once the cursor has passed the last task
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.tasks.len()
    }

    /// Mark the run finished without advancing, used when the list is already exhausted
    pub fn finish(&mut self) {
        if !self.status.is_terminal() {
            self.status = PipelineStatus::Completed;
        }
    }

    /// Move past the current task after its completion signal
    pub fn advance(&mut self, history: &ConversationHistory) -> AdvanceOutcome {
        let next = self.cursor + 1;

        if next >= self.tasks.len() {
            info!(cursor = next, total = self.tasks.len(), "All tasks finished");
            self.cursor = next.min(self.tasks.len());
            self.status = PipelineStatus::Completed;
            return AdvanceOutcome::Finished;
        }

        match self.carry_forward(history) {
            Ok((system, project_context)) => {
                self.cursor = next;
                info!(
                    cursor = self.cursor,
                    task_id = self.current_task().map(|t| t.id.as_str()).unwrap_or_default(),
                    "Advanced to next task"
                );
                AdvanceOutcome::NextTask {
                    history: vec![system, Message::user(project_context.clone())],
                    project_context,
                }
            }
            Err(e) => {
                error!(cursor = self.cursor, "Failed to advance to next task: {}", e);
                self.status = PipelineStatus::Error;
                let report = prompts::advance_error_report(&sanitize_error_message(&e.to_string()));
                let system = history
                    .system()
                    .cloned()
                    .unwrap_or_else(|| Message::system("Error"));
                AdvanceOutcome::Failed {
                    history: vec![system, Message::assistant(AgentReply::plain(report.clone()))],
                    report,
                }
            }
        }
    }

    /// System message and context text for the next task
    fn carry_forward(
        &self,
        history: &ConversationHistory,
    ) -> Result<(Message, String), SequencingError> {
        let system = history
            .system()
            .cloned()
            .ok_or(SequencingError::MissingSystemMessage)?;
        let finished = self
            .current_task()
            .ok_or(SequencingError::CursorOutOfRange {
                cursor: self.cursor,
                len: self.tasks.len(),
            })?;

        let files = written_files(history);
        let summary = task_summary(history);

        Ok((
            system,
            prompts::project_context(&self.project_name, &finished.title, &files, &summary),
        ))
    }
}

/// Latest model-written plain reply, or the fallback (pure function)
pub fn task_summary(history: &ConversationHistory) -> String {
    history
        .agent_replies()
        .rev()
        .find_map(|reply| match reply {
            AgentReply::PlainContent {
                content,
                synthetic: false,
            } if !content.trim().is_empty() => Some(content.trim().to_string()),
            _ => None,
        })
        .unwrap_or_else(|| FALLBACK_SUMMARY.to_string())
}

/// Paths of every write_file request, first occurrence order (pure function).
///
/// Requests without a string `path` were already rejected by the gateway and
/// are skipped.
pub fn written_files(history: &ConversationHistory) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();

    for call in history
        .agent_replies()
        .flat_map(|reply| reply.tool_requests().iter())
        .filter(|call| call.name == WRITE_FILE_TOOL)
    {
        let Some(path) = call.arguments["path"].as_str() else {
            debug!(call_id = %call.id, "Skipping write_file request without a path");
            continue;
        };
        if !files.iter().any(|f| f == path) {
            files.push(path.to_string());
        }
    }

    files
}
