//! Task model and planner output parsing
//!
//! Tasks are produced by the planning phase and are read-only here.

use crate::developer::PipelineStatus;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

/// One planning unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Target paths, in order
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub success_criteria: String,
    /// Advisory only; never enforced by the engine
    #[serde(default)]
    pub dependencies: Dependencies,
}

/// Free-text or structured dependency reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Dependencies {
    #[default]
    None,
    Text(String),
    List(Vec<Value>),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "task id must be a string or number, got {other}"
        ))),
    }
}

/// Planner output parsing errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Planner output contains no JSON")]
    MissingJson,
    #[error("Planner output is not a valid task list: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Duplicate task id: {0}")]
    DuplicateId(String),
}

/// Ordered task list; insertion order is execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    List(Vec<Task>),
    Wrapped { tasks: Vec<Task> },
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    /// Parse the planning agent's reply into a task list.
    ///
    /// Accepts a fenced ```json block or bare JSON, holding either an array of
    /// tasks or an object with a `tasks` array.
    pub fn from_plan_output(text: &str) -> Result<Self, PlanError> {
        let json = extract_json_from_markdown(text)
            .or_else(|| {
                let trimmed = text.trim();
                (trimmed.starts_with('[') || trimmed.starts_with('{')).then(|| trimmed.to_string())
            })
            .ok_or(PlanError::MissingJson)?;

        let tasks = match serde_json::from_str::<PlanDocument>(&json)? {
            PlanDocument::List(tasks) | PlanDocument::Wrapped { tasks } => tasks,
        };

        let mut seen = std::collections::HashSet::new();
        for task in &tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(PlanError::DuplicateId(task.id.clone()));
            }
        }

        info!(tasks = tasks.len(), "Parsed task list from planner output");
        Ok(Self { tasks })
    }

    /// Parse planner output, falling back to an empty list with an error status
    pub fn from_plan_output_or_empty(text: &str) -> (Self, PipelineStatus) {
        match Self::from_plan_output(text) {
            Ok(tasks) => (tasks, PipelineStatus::InProgress),
            Err(e) => {
                error!("Task list parsing failed: {}", e);
                (Self::default(), PipelineStatus::Error)
            }
        }
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

/// Extract JSON from the first fenced code block (pure function)
fn extract_json_from_markdown(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        let content = &text[start + 7..];
        if let Some(end) = content.find("```") {
            return Some(content[..end].trim().to_string());
        }
    }

    // ``` blocks without language specifier
    if let Some(start) = text.find("```") {
        let content = &text[start + 3..];
        if let Some(end) = content.find("```") {
            let potential_json = content[..end].trim();
            if potential_json.starts_with('[') || potential_json.starts_with('{') {
                return Some(potential_json.to_string());
            }
        }
    }

    None
}
