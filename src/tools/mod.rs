//! Tool system for the developer agent
//!
//! `ToolSystem` is the Tool Gateway: it owns the registered tools, validates
//! arguments against each tool's JSON schema, and turns every call into a
//! correlated tool-result message. Failures never escape `dispatch`; they
//! become result content the agent can react to.

use crate::llm::{Message, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub mod builtin;
pub mod workspace;

pub use workspace::Workspace;

/// Name of the completion signal tool
pub const NEXT_TASK_TOOL: &str = "next_task";
/// Name of the file-producing tool scanned when carrying context forward
pub const WRITE_FILE_TOOL: &str = "write_file";

/// Tool interface
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON Schema for the parameters
    fn describe(&self) -> ToolDescription;

    /// Receives the `[tools.<name>]` table from the config file, if any.
    /// Called once before the tool is registered.
    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError>;

    /// Parameters have already been validated against the schema from `describe()`
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;
}

/// Tool description bound to the Completion Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry and executor for tools
pub struct ToolSystem {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolSystem {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build the developer tool set over a sandboxed workspace
    pub async fn developer<P: AsRef<Path>>(
        workspace_root: P,
        tool_configs: &HashMap<String, Value>,
    ) -> Result<Self, ToolError> {
        let workspace = Arc::new(Workspace::create(workspace_root).await?);
        let mut system = Self::new();

        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(builtin::WriteFileTool::new(workspace.clone())),
            Box::new(builtin::EditFileTool::new(workspace.clone())),
            Box::new(builtin::ReadFileTool::new(workspace.clone())),
            Box::new(builtin::ListFilesTool::new(workspace)),
            Box::new(builtin::ValidateTaskCompletionTool::new()),
            Box::new(builtin::NextTaskTool::new()),
        ];

        for tool in tools {
            let name = tool.describe().name;
            system.register(tool, tool_configs.get(&name)).await?;
        }

        Ok(system)
    }

    /// Initialize a tool with its config and add it to the registry
    pub async fn register(
        &mut self,
        mut tool: Box<dyn Tool>,
        config: Option<&Value>,
    ) -> Result<(), ToolError> {
        let name = tool.describe().name;
        tool.initialize(config).await?;
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get tool description
    pub fn describe_tool(&self, tool_name: &str) -> Option<ToolDescription> {
        self.tools.get(tool_name).map(|tool| tool.describe())
    }

    /// Descriptions of every registered tool, sorted by name
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        let mut descriptions: Vec<ToolDescription> =
            self.tools.values().map(|tool| tool.describe()).collect();
        descriptions.sort_by(|a, b| a.name.cmp(&b.name));
        descriptions
    }

    /// Execute tool with validated parameters
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: &Value,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        Self::validate_parameters(&tool.describe(), parameters)?;

        tool.execute(parameters).await
    }

    /// Execute requested calls in order, one tool-result message per call
    #[instrument(skip_all, fields(calls = calls.len()))]
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let content = match self.execute_tool(&call.name, &call.arguments).await {
                Ok(output) => {
                    debug!(tool = %call.name, call_id = %call.id, "Tool call succeeded");
                    Self::render_output(output)
                }
                Err(e) => {
                    warn!(tool = %call.name, call_id = %call.id, "Tool call failed: {}", e);
                    format!("Error: {e}")
                }
            };
            results.push(Message::tool_result(&call.id, &call.name, content));
        }

        results
    }

    /// Validate parameters against a tool schema (pure function)
    fn validate_parameters(
        description: &ToolDescription,
        parameters: &Value,
    ) -> Result<(), ToolError> {
        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ToolError::ValidationError(error_messages.join("; "))
        })
    }

    /// Tool output as message text (pure function)
    fn render_output(output: Value) -> String {
        match output {
            Value::String(text) => text,
            other => other.to_string(),
        }
    }

    /// Get list of available tools
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool system errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_tool_system_creation() {
        let tool_system = ToolSystem::new();
        assert_eq!(tool_system.list_tools().len(), 0);
    }

    #[tokio::test]
    async fn test_developer_tool_set() {
        let dir = TempDir::new().unwrap();
        let tools = ToolSystem::developer(dir.path(), &HashMap::new())
            .await
            .unwrap();

        assert_eq!(
            tools.list_tools(),
            vec![
                "edit_file",
                "list_files",
                "next_task",
                "read_file",
                "validate_task_completion",
                "write_file"
            ]
        );
        assert_eq!(tools.descriptions().len(), 6);
        assert!(tools.describe_tool(NEXT_TASK_TOOL).is_some());
    }

    #[tokio::test]
    async fn test_tool_execution_unknown_tool() {
        let tool_system = ToolSystem::new();
        let result = tool_system.execute_tool("unknown", &json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_schema_violation_is_rejected_before_execution() {
        let dir = TempDir::new().unwrap();
        let tools = ToolSystem::developer(dir.path(), &HashMap::new())
            .await
            .unwrap();

        let result = tools
            .execute_tool(WRITE_FILE_TOOL, &json!({"path": "index.html"}))
            .await;
        assert!(matches!(result, Err(ToolError::ValidationError(_))));
        assert!(!dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn test_dispatch_correlates_results_and_reports_errors() {
        let dir = TempDir::new().unwrap();
        let tools = ToolSystem::developer(dir.path(), &HashMap::new())
            .await
            .unwrap();

        let results = tools
            .dispatch(&[
                call("c1", "write_file", json!({"path": "a.html", "content": "<p>a</p>"})),
                call("c2", "read_file", json!({"path": "missing.html"})),
                call("c3", "deploy", json!({})),
            ])
            .await;

        assert_eq!(results.len(), 3);
        let ids: Vec<&str> = results
            .iter()
            .map(|m| match m {
                Message::Tool { call_id, .. } => call_id.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(results[0].content().starts_with("Successfully wrote"));
        assert!(results[1].content().starts_with("Error:"));
        assert!(results[2].content().contains("Unknown tool: deploy"));
        assert!(dir.path().join("a.html").exists());
    }

    #[tokio::test]
    async fn test_tool_config_is_applied() {
        let dir = TempDir::new().unwrap();
        let mut configs = HashMap::new();
        configs.insert("write_file".to_string(), json!({"max_file_size": 4}));
        let tools = ToolSystem::developer(dir.path(), &configs).await.unwrap();

        let result = tools
            .execute_tool(WRITE_FILE_TOOL, &json!({"path": "a.txt", "content": "too long"}))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionError(_))));
    }
}
