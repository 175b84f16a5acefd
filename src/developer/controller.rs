//! Pipeline controller
//!
//! Composes the executor, the tool gateway and the sequencer into the
//! development state machine:
//!
//! ```text
//! agent ──continue──▶ agent
//! agent ──tools────▶ dispatch_tools ──▶ agent
//! agent ──next_task▶ advance ──in progress──▶ agent
//!                            ──completed/error▶ done
//! agent ──no tasks left──▶ done
//! ```
//!
//! The machine runs as a plain loop, so a run may take any number of turns.

use crate::config::BuilderConfig;
use crate::developer::executor::{ExecutorSettings, TaskExecutor, TurnInput};
use crate::developer::history::ConversationHistory;
use crate::developer::routing::{route, Route};
use crate::developer::sequencer::{AdvanceOutcome, TaskSequencer};
use crate::developer::{prompts, Phase, PipelineStatus, TaskList};
use crate::error::BuilderResult;
use crate::llm::{AgentReply, LlmProvider, Message};
use crate::session::SessionStore;
use crate::tools::ToolSystem;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Summary used when the run ends in error before any task could start
pub const NO_TASKS_SUMMARY: &str = "Task planning failed: no tasks to execute";

/// State after one controller step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub status: PipelineStatus,
    pub cursor: usize,
    pub task_count: usize,
    pub current_task_id: Option<String>,
    pub history_len: usize,
    /// When true, `delta` replaced the whole history instead of extending it
    pub reset: bool,
    pub delta: Vec<Message>,
    /// Final human-readable summary, set on the `done` event
    pub summary: Option<String>,
}

/// One executed controller step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub phase: Phase,
    pub snapshot: PipelineSnapshot,
}

/// Result of draining a run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub status: PipelineStatus,
    pub summary: String,
    pub cursor: usize,
    pub history: Vec<Message>,
    /// Phases in the order they ran
    pub phases: Vec<Phase>,
    pub iterations: usize,
}

struct StepResult {
    delta: Vec<Message>,
    reset: bool,
    next: Phase,
}

pub struct PipelineController {
    executor: TaskExecutor,
    tools: Arc<ToolSystem>,
    sequencer: TaskSequencer,
    history: ConversationHistory,
    workspace: PathBuf,
    phase: Phase,
    instruction_sent: bool,
    project_context: Option<String>,
    summary: Option<String>,
    session: Option<(Arc<dyn SessionStore>, String)>,
}

impl PipelineController {
    pub fn new(
        executor: TaskExecutor,
        tools: Arc<ToolSystem>,
        sequencer: TaskSequencer,
        system_prompt: String,
        workspace: PathBuf,
    ) -> Self {
        Self {
            executor,
            tools,
            sequencer,
            history: ConversationHistory::new(Message::system(system_prompt)),
            workspace,
            phase: Phase::Agent,
            instruction_sent: false,
            project_context: None,
            summary: None,
            session: None,
        }
    }

    /// Wire a controller from configuration with an injected Completion Client
    pub async fn from_config(
        config: &BuilderConfig,
        provider: Arc<dyn LlmProvider>,
        tasks: TaskList,
        initial_status: PipelineStatus,
    ) -> BuilderResult<Self> {
        let tools = ToolSystem::developer(&config.project.workspace, &config.tool_configs()).await?;
        let settings = ExecutorSettings::from_config(config);
        let system_prompt = config
            .llm
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompts::developer_system_prompt(settings.max_tool_content_chars));

        let executor = TaskExecutor::new(provider, tools.descriptions(), settings);
        let sequencer =
            TaskSequencer::new(tasks, config.project.name.clone()).with_status(initial_status);

        Ok(Self::new(
            executor,
            Arc::new(tools),
            sequencer,
            system_prompt,
            config.project.workspace.clone(),
        ))
    }

    /// Persist every snapshot into a session record
    pub fn with_session<S: Into<String>>(mut self, store: Arc<dyn SessionStore>, id: S) -> Self {
        self.session = Some((store, id.into()));
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn sequencer(&self) -> &TaskSequencer {
        &self.sequencer
    }

    /// Run the pipeline, yielding one event per executed phase.
    ///
    /// The stream ends after the `done` event.
    pub fn start(self) -> impl Stream<Item = PipelineEvent> {
        async_stream::stream! {
            let mut controller = self;
            loop {
                let event = controller.step().await;
                controller.persist(&event).await;
                let finished = event.phase == Phase::Done;
                yield event;
                if finished {
                    break;
                }
            }
        }
    }

    /// Run the pipeline to its terminal state
    pub async fn run_to_completion(mut self) -> PipelineOutcome {
        let mut phases = Vec::new();
        loop {
            let event = self.step().await;
            self.persist(&event).await;
            phases.push(event.phase);
            if event.phase == Phase::Done {
                break;
            }
        }

        PipelineOutcome {
            status: self.sequencer.status(),
            summary: self.summary.clone().unwrap_or_default(),
            cursor: self.sequencer.cursor(),
            history: self.history.into_messages(),
            iterations: phases.len(),
            phases,
        }
    }

    /// Execute the current phase and move to the next one
    #[instrument(skip(self), fields(phase = %self.phase, cursor = self.sequencer.cursor()))]
    async fn step(&mut self) -> PipelineEvent {
        if self.phase == Phase::Agent
            && (self.sequencer.is_exhausted() || self.sequencer.status().is_terminal())
        {
            debug!("No active task, finishing");
            self.phase = Phase::Done;
        }

        let executed = self.phase;
        let result = match executed {
            Phase::Agent => self.agent_step().await,
            Phase::DispatchTools => self.dispatch_step().await,
            Phase::Advance => self.advance_step().await,
            Phase::Done => self.done_step(),
        };
        self.phase = result.next;

        PipelineEvent {
            phase: executed,
            snapshot: self.snapshot(executed, result.delta, result.reset),
        }
    }

    async fn agent_step(&mut self) -> StepResult {
        let Some(task) = self.sequencer.current_task() else {
            return StepResult {
                delta: Vec::new(),
                reset: false,
                next: Phase::Done,
            };
        };

        let delta = self
            .executor
            .execute_turn(TurnInput {
                history: &self.history,
                task,
                project_context: self.project_context.as_deref(),
                instruction_sent: self.instruction_sent,
            })
            .await;

        self.instruction_sent = true;
        self.history.append(delta.clone());

        let next = match route(self.history.last()) {
            Route::Continue => Phase::Agent,
            Route::DispatchTools => Phase::DispatchTools,
            Route::Advance => Phase::Advance,
        };
        debug!(next = %next, "Routed agent reply");

        StepResult {
            delta,
            reset: false,
            next,
        }
    }

    async fn dispatch_step(&mut self) -> StepResult {
        let delta = self.answer_pending_requests().await;
        self.history.append(delta.clone());
        StepResult {
            delta,
            reset: false,
            next: Phase::Agent,
        }
    }

    async fn advance_step(&mut self) -> StepResult {
        // Requests sent alongside next_task still run before the context reset
        let results = self.answer_pending_requests().await;
        self.history.append(results.clone());

        match self.sequencer.advance(&self.history) {
            AdvanceOutcome::Finished => StepResult {
                delta: results,
                reset: false,
                next: Phase::Done,
            },
            AdvanceOutcome::NextTask {
                history,
                project_context,
            } => {
                self.history.replace(history.clone());
                self.instruction_sent = false;
                self.project_context = Some(project_context);
                StepResult {
                    delta: history,
                    reset: true,
                    next: Phase::Agent,
                }
            }
            AdvanceOutcome::Failed { history, report } => {
                self.history.replace(history.clone());
                self.summary = Some(report);
                StepResult {
                    delta: history,
                    reset: true,
                    next: Phase::Done,
                }
            }
        }
    }

    fn done_step(&mut self) -> StepResult {
        self.sequencer.finish();

        if self.sequencer.status() == PipelineStatus::Error && self.summary.is_some() {
            // history already holds [System, error report]
            return StepResult {
                delta: Vec::new(),
                reset: false,
                next: Phase::Done,
            };
        }

        let summary = match self.sequencer.status() {
            PipelineStatus::Error => NO_TASKS_SUMMARY.to_string(),
            _ => prompts::completion_summary(self.sequencer.tasks().len(), &self.workspace),
        };
        info!(status = %self.sequencer.status(), "Pipeline finished: {}", summary);

        let system = self
            .history
            .system()
            .cloned()
            .unwrap_or_else(|| Message::system("Project completion"));
        let final_history = vec![
            system,
            Message::assistant(AgentReply::plain(summary.clone())),
        ];
        self.history.replace(final_history.clone());
        self.summary = Some(summary);

        StepResult {
            delta: final_history,
            reset: true,
            next: Phase::Done,
        }
    }

    /// Run the tool requests of the latest reply
    async fn answer_pending_requests(&self) -> Vec<Message> {
        let calls = self
            .history
            .last()
            .and_then(Message::reply)
            .map(|reply| reply.tool_requests().to_vec())
            .unwrap_or_default();
        if calls.is_empty() {
            return Vec::new();
        }
        self.tools.dispatch(&calls).await
    }

    fn snapshot(&self, executed: Phase, delta: Vec<Message>, reset: bool) -> PipelineSnapshot {
        let summary = if executed == Phase::Done {
            self.summary.clone()
        } else {
            None
        };
        PipelineSnapshot {
            status: self.sequencer.status(),
            cursor: self.sequencer.cursor(),
            task_count: self.sequencer.tasks().len(),
            current_task_id: self.sequencer.current_task().map(|t| t.id.clone()),
            history_len: self.history.len(),
            reset,
            delta,
            summary,
        }
    }

    async fn persist(&self, event: &PipelineEvent) {
        let Some((store, id)) = &self.session else {
            return;
        };

        let phase = event.phase;
        let snapshot = event.snapshot.clone();
        let history = self.history.messages().to_vec();
        let update = store
            .update(
                id,
                Box::new(move |record| {
                    record.status = snapshot.status;
                    record.cursor = snapshot.cursor;
                    record.phase = Some(phase);
                    record.snapshot = Some(snapshot);
                    record.history = history;
                }),
            )
            .await;

        if let Err(e) = update {
            warn!(session_id = %id, "Failed to persist pipeline snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::developer::{Dependencies, Task};
    use crate::testing::mocks::ScriptedLlmProvider;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn tasks(n: usize) -> TaskList {
        TaskList::new(
            (1..=n)
                .map(|i| Task {
                    id: format!("T{i}"),
                    title: format!("Page {i}"),
                    description: String::new(),
                    files: vec![],
                    success_criteria: String::new(),
                    dependencies: Dependencies::None,
                })
                .collect(),
        )
    }

    async fn controller(dir: &TempDir, task_count: usize) -> PipelineController {
        let tools = ToolSystem::developer(dir.path(), &HashMap::new())
            .await
            .unwrap();
        let executor = TaskExecutor::new(
            Arc::new(ScriptedLlmProvider::default()),
            tools.descriptions(),
            ExecutorSettings::new("mock-model"),
        );
        PipelineController::new(
            executor,
            Arc::new(tools),
            TaskSequencer::new(tasks(task_count), "site"),
            "sys".to_string(),
            dir.path().to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_lost_system_message_ends_run_with_error_report() {
        let dir = TempDir::new().unwrap();
        let mut controller = controller(&dir, 3).await;
        controller.history = ConversationHistory::from_messages(Vec::new());

        let outcome = controller.run_to_completion().await;

        assert_eq!(outcome.status, PipelineStatus::Error);
        assert_eq!(outcome.cursor, 0);
        assert_eq!(
            outcome.phases,
            vec![Phase::Agent, Phase::Advance, Phase::Done]
        );
        assert_eq!(outcome.history.len(), 2);
        assert!(matches!(outcome.history[0], Message::System { .. }));
        assert!(outcome
            .summary
            .starts_with("❌ Error advancing to next task"));
        assert!(outcome.summary.contains("system message"));
        assert_eq!(outcome.history[1].content(), outcome.summary);
    }
}
