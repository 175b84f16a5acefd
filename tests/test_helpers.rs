//! Shared fixtures for integration tests

#![allow(dead_code)]

use futures::StreamExt;
use serde_json::json;
use sitewright::config::BuilderConfig;
use sitewright::developer::{
    ConversationHistory, Dependencies, PipelineController, PipelineEvent, PipelineStatus, Task,
    TaskList,
};
use sitewright::llm::LlmProvider;
use sitewright::testing::ScriptedLlmProvider;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Configuration whose workspace lives in the given directory
pub fn test_config(workspace: &Path) -> BuilderConfig {
    let toml_content = format!(
        r#"
[project]
name = "test-site"
workspace = "{}"

[llm]
provider = "openai"
model = "deepseek-chat"
api_key_env = "SITEWRIGHT_TEST_API_KEY"
max_tokens = 4096
"#,
        workspace.display()
    );
    BuilderConfig::from_toml_str(&toml_content).expect("test config should parse")
}

pub fn task(id: &str, title: &str, files: &[&str]) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Implement {title}"),
        files: files.iter().map(|f| f.to_string()).collect(),
        success_criteria: "Files exist and render".to_string(),
        dependencies: Dependencies::None,
    }
}

/// Task list of `count` generic tasks
pub fn task_list(count: usize) -> TaskList {
    TaskList::new(
        (1..=count)
            .map(|n| task(&format!("T{n}"), &format!("Page {n}"), &[]))
            .collect(),
    )
}

/// Planner output for a two page site
pub fn plan_output() -> String {
    let tasks = json!([
        {
            "id": "T1",
            "title": "Home page",
            "description": "Create index.html with hero section",
            "files": ["index.html"],
            "success_criteria": "index.html exists"
        },
        {
            "id": 2,
            "title": "Stylesheet",
            "description": "Create styles.css",
            "files": ["styles.css"],
            "success_criteria": "styles.css exists",
            "dependencies": ["T1"]
        }
    ]);
    format!("Here is the plan:\n\n```json\n{tasks:#}\n```\n")
}

/// Workspace directory plus a controller driven by the scripted provider
pub struct Harness {
    pub workspace: TempDir,
    pub provider: Arc<ScriptedLlmProvider>,
    pub controller: PipelineController,
}

pub async fn harness(
    provider: ScriptedLlmProvider,
    tasks: TaskList,
    status: PipelineStatus,
) -> Harness {
    let provider = Arc::new(provider);
    let (workspace, controller) = build_controller(provider.clone(), tasks, status).await;

    Harness {
        workspace,
        provider,
        controller,
    }
}

/// Controller over a fresh temporary workspace with any Completion Client
pub async fn build_controller(
    provider: Arc<dyn LlmProvider>,
    tasks: TaskList,
    status: PipelineStatus,
) -> (TempDir, PipelineController) {
    let workspace = TempDir::new().expect("temp workspace");
    let config = test_config(workspace.path());
    let controller = PipelineController::from_config(&config, provider, tasks, status)
        .await
        .expect("controller should build");
    (workspace, controller)
}

/// Every history sent to the model has a result for each earlier request
pub async fn assert_every_request_answered(provider: &ScriptedLlmProvider) {
    for (turn, request) in provider.requests().await.into_iter().enumerate() {
        let unanswered = ConversationHistory::from_messages(request.messages).unanswered_requests();
        assert!(
            unanswered.is_empty(),
            "turn {turn} was sent with unanswered requests {unanswered:?}"
        );
    }
}

/// Drain the event stream
pub async fn collect_events(controller: PipelineController) -> Vec<PipelineEvent> {
    controller.start().collect().await
}
