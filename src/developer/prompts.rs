//! Text the engine sends to the developer agent
//!
//! Wording lives here so the executor and sequencer only deal with structure.

use crate::developer::Task;
use crate::tools::NEXT_TASK_TOOL;
use std::path::Path;

/// Default system prompt for the developer agent
pub fn developer_system_prompt(max_tool_content_chars: usize) -> String {
    format!(
        "You are a web developer agent with access to a sandboxed project workspace. \
You execute website development tasks one at a time, creating and modifying files with your tools.\n\n\
Tools:\n\
- write_file(path, content): create or overwrite a file\n\
- edit_file(path, edits): replace exact text using oldText/newText pairs\n\
- read_file(path): read a file\n\
- list_files(path): list a directory\n\
- validate_task_completion(task_id, success_criteria): check your work\n\
- {NEXT_TASK_TOOL}(): signal that the current task is complete\n\n\
Keep the content of every tool call under {max_tool_content_chars} characters. \
Build large files from a small skeleton and grow them with several edit_file calls, \
or split them into separate files. If a tool call is rejected, retry with smaller pieces \
instead of repeating the same call.\n\n\
Call {NEXT_TASK_TOOL} as soon as every file the task requires exists."
    )
}

/// First message of a task (pure function)
pub fn task_instruction(
    task: &Task,
    project_context: Option<&str>,
    max_tool_content_chars: usize,
) -> String {
    let files = if task.files.is_empty() {
        "(none specified)".to_string()
    } else {
        task.files.join(", ")
    };

    let mut instruction = format!(
        "Execute this task:\n\n\
**Task ID:** {}\n\
**Title:** {}\n\
**Description:** {}\n\
**Files to work with:** {}\n\
**Success Criteria:** {}\n",
        task.id,
        non_empty(&task.title, "Untitled"),
        non_empty(&task.description, "No description"),
        files,
        non_empty(&task.success_criteria, "No criteria specified"),
    );

    if let Some(context) = project_context {
        instruction.push_str(&format!("\n**Project context:**\n{context}\n"));
    }

    instruction.push_str(&format!(
        "\nYou may keep issuing tool calls until the task is done. \
Keep each tool call under {max_tool_content_chars} characters.\n\
**After ALL required files for this task exist, call {NEXT_TASK_TOOL} immediately.**"
    ));

    instruction
}

/// Tool result answering a request the Completion Client rejected (pure function)
pub fn corrective_result(error: &str, max_tool_content_chars: usize) -> String {
    format!(
        "Tool call failed due to content size or formatting issues.\n\
ERROR: {error}\n\
SOLUTION: Break your content into smaller pieces (under {max_tool_content_chars} characters) \
and retry using multiple smaller operations instead of one large one."
    )
}

/// Synthetic agent reply written when a completion call fails (pure function)
pub fn retry_notice(error: &str) -> String {
    format!("Call failed with this exception {error} please try again")
}

/// Carry-forward summary for the next task (pure function)
pub fn project_context(project: &str, finished_title: &str, files: &[String], summary: &str) -> String {
    let files = if files.is_empty() {
        "(no files written)".to_string()
    } else {
        files.join(", ")
    };

    format!(
        "Project: {project}\n\
Previous task completed: {finished_title}\n\
Files created: {files}\n\
Summary: {summary}"
    )
}

/// Final message after the last task (pure function)
pub fn completion_summary(task_count: usize, workspace: &Path) -> String {
    format!(
        "All {task_count} tasks completed successfully! Website development finished. \
Project files are available in: {}",
        workspace.display()
    )
}

/// Agent-visible report of a sequencing failure (pure function)
pub fn advance_error_report(error: &str) -> String {
    format!("❌ Error advancing to next task: {error}")
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
