//! Development phase engine
//!
//! Walks an ordered task list, driving the developer agent through a
//! tool-calling loop per task:
//!
//! - [`executor`] runs one agent turn and returns the messages to append
//! - [`routing`] decides what the latest reply asks for
//! - [`sequencer`] moves the cursor and resets context between tasks
//! - [`controller`] composes them into the pipeline state machine

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod controller;
pub mod executor;
pub mod history;
pub mod prompts;
pub mod routing;
pub mod sequencer;
pub mod task;

pub use controller::{PipelineController, PipelineEvent, PipelineOutcome, PipelineSnapshot};
pub use executor::TaskExecutor;
pub use history::ConversationHistory;
pub use routing::{route, Route};
pub use sequencer::{SequencingError, TaskSequencer};
pub use task::{Dependencies, PlanError, Task, TaskList};

/// Overall pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    InProgress,
    Completed,
    Error,
}

impl PipelineStatus {
    /// `Completed` and `Error` are never left once reached
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Agent,
    DispatchTools,
    Advance,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Agent => "agent",
            Self::DispatchTools => "dispatch_tools",
            Self::Advance => "advance",
            Self::Done => "done",
        };
        f.write_str(text)
    }
}
