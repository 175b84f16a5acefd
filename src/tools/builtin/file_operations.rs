//! File operation tools for the project workspace
//!
//! write_file, edit_file, read_file and list_files. All paths go through the
//! shared [`Workspace`] sandbox; pure helpers are kept separate from I/O.

use crate::tools::workspace::Workspace;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024;

/// Read the `max_file_size` override from a tool config table (pure function)
fn configured_max_size(config: Option<&Value>, current: usize) -> usize {
    config
        .and_then(|c| c.get("max_file_size"))
        .and_then(Value::as_u64)
        .map(|size| size as usize)
        .unwrap_or(current)
}

/// Extract a required string argument (pure function)
fn string_arg<'a>(parameters: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    parameters[name]
        .as_str()
        .ok_or_else(|| ToolError::ValidationError(format!("'{name}' must be a string")))
}

fn io_error(action: &str, path: &str, e: std::io::Error) -> ToolError {
    ToolError::ExecutionError(format!("Failed to {action} '{path}': {e}"))
}

/// write_file - create or overwrite a file
pub struct WriteFileTool {
    workspace: Arc<Workspace>,
    max_file_size: usize,
}

impl WriteFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Check content size constraints (pure function)
    fn check_content_size(content_len: usize, max_size: usize) -> Result<(), String> {
        if content_len > max_size {
            return Err(format!(
                "Content too large: {content_len} bytes (max: {max_size})"
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: crate::tools::WRITE_FILE_TOOL.to_string(),
            description: "Create a new file or overwrite an existing one with the given content. Parent directories are created as needed.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the project workspace" },
                    "content": { "type": "string" }
                },
                "required": ["path", "content"],
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError> {
        self.max_file_size = configured_max_size(config, self.max_file_size);
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let path_str = string_arg(parameters, "path")?;
        let content = string_arg(parameters, "content")?;

        Self::check_content_size(content.len(), self.max_file_size)
            .map_err(ToolError::ExecutionError)?;

        let path = self.workspace.resolve(path_str)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directories for", path_str, e))?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error("write", path_str, e))?;

        Ok(Value::String(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            self.workspace.display_path(&path)
        )))
    }
}

/// One replacement applied by edit_file
#[derive(Debug, Clone, Deserialize)]
pub struct TextEdit {
    #[serde(rename = "oldText")]
    pub old_text: String,
    #[serde(rename = "newText")]
    pub new_text: String,
}

/// edit_file - apply exact-text replacements to an existing file
pub struct EditFileTool {
    workspace: Arc<Workspace>,
}

impl EditFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    /// Apply edits in order; the first missing `oldText` fails the whole edit (pure function)
    pub fn apply_edits(original: &str, edits: &[TextEdit]) -> Result<String, String> {
        let mut updated = original.to_string();
        for (index, edit) in edits.iter().enumerate() {
            if edit.old_text.is_empty() {
                return Err(format!("Edit {index}: oldText must not be empty"));
            }
            if !updated.contains(&edit.old_text) {
                return Err(format!(
                    "Edit {index}: oldText not found in file: {:?}",
                    edit.old_text
                ));
            }
            updated = updated.replacen(&edit.old_text, &edit.new_text, 1);
        }
        Ok(updated)
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "edit_file".to_string(),
            description: "Modify an existing file by replacing exact text. Each edit replaces the first occurrence of oldText with newText.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "edits": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "oldText": { "type": "string" },
                                "newText": { "type": "string" }
                            },
                            "required": ["oldText", "newText"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["path", "edits"],
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self, _config: Option<&Value>) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let path_str = string_arg(parameters, "path")?;
        let edits: Vec<TextEdit> = serde_json::from_value(parameters["edits"].clone())
            .map_err(|e| ToolError::ValidationError(format!("Invalid edits: {e}")))?;

        let path = self.workspace.resolve(path_str)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("read", path_str, e))?;

        let updated = Self::apply_edits(&original, &edits).map_err(ToolError::ExecutionError)?;

        tokio::fs::write(&path, &updated)
            .await
            .map_err(|e| io_error("write", path_str, e))?;

        Ok(Value::String(format!(
            "Applied {} edit(s) to {}",
            edits.len(),
            self.workspace.display_path(&path)
        )))
    }
}

/// read_file - return file contents
pub struct ReadFileTool {
    workspace: Arc<Workspace>,
    max_file_size: usize,
}

impl ReadFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Check file size constraints (pure function)
    fn check_file_size(file_size: u64, max_size: usize) -> Result<(), String> {
        if file_size > max_size as u64 {
            return Err(format!(
                "File too large: {file_size} bytes (max: {max_size})"
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "read_file".to_string(),
            description: "Read the complete contents of a file in the project workspace".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError> {
        self.max_file_size = configured_max_size(config, self.max_file_size);
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let path_str = string_arg(parameters, "path")?;
        let path = self.workspace.resolve(path_str)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error("stat", path_str, e))?;
        if !metadata.is_file() {
            return Err(ToolError::ExecutionError(format!(
                "Path is not a file: {path_str}"
            )));
        }
        Self::check_file_size(metadata.len(), self.max_file_size)
            .map_err(ToolError::ExecutionError)?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("read", path_str, e))?;

        Ok(Value::String(content))
    }
}

/// list_files - list one directory level
pub struct ListFilesTool {
    workspace: Arc<Workspace>,
}

impl ListFilesTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    /// Render directory entries sorted by name (pure function)
    fn format_listing(mut entries: Vec<(String, bool)>) -> String {
        if entries.is_empty() {
            return "(empty directory)".to_string();
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(name, is_dir)| {
                if is_dir {
                    format!("[DIR] {name}")
                } else {
                    format!("[FILE] {name}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn read_entries(path: &Path, path_str: &str) -> Result<Vec<(String, bool)>, ToolError> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|e| io_error("list", path_str, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error("list", path_str, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "list_files".to_string(),
            description: "List files and directories at a path in the project workspace".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to list; defaults to the workspace root" }
                },
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self, _config: Option<&Value>) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let path_str = parameters["path"].as_str().unwrap_or(".");
        let path = self.workspace.resolve(path_str)?;
        let entries = Self::read_entries(&path, path_str).await?;
        Ok(Value::String(Self::format_listing(entries)))
    }
}
