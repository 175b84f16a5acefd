//! Builtin tools for the developer agent
//!
//! Each tool type has its own module with pure functions separated from I/O.

pub mod control;
pub mod file_operations;

pub use control::{NextTaskTool, ValidateTaskCompletionTool};
pub use file_operations::{EditFileTool, ListFilesTool, ReadFileTool, TextEdit, WriteFileTool};
