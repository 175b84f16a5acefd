//! sitewright - task execution engine for LLM-built static websites
//!
//! A planning phase produces an ordered task list; this crate drives a
//! developer agent through it. Each task runs as a bounded tool-calling loop
//! against a sandboxed project workspace, and the pipeline ends with a
//! `completed` or `error` status plus a human-readable summary.
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use sitewright::config::BuilderConfig;
//! use sitewright::developer::{PipelineController, TaskList};
//! use sitewright::llm::providers::{OpenAiConfig, OpenAiProvider};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BuilderConfig::load_from_file("sitewright.toml".as_ref())?;
//! let provider = Arc::new(OpenAiProvider::new(OpenAiConfig {
//!     api_key: config.get_llm_api_key()?,
//!     ..Default::default()
//! })?);
//!
//! let (tasks, status) = TaskList::from_plan_output_or_empty(r#"[{"id": "T1", "title": "Home page"}]"#);
//! let controller = PipelineController::from_config(&config, provider, tasks, status).await?;
//!
//! let events = controller.start();
//! futures::pin_mut!(events);
//! while let Some(event) = events.next().await {
//!     println!("{} -> {}", event.phase, event.snapshot.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod developer;
pub mod error;
pub mod llm;
pub mod observability;
pub mod session;
pub mod testing;
pub mod tools;

pub use config::*;
pub use developer::{PipelineController, PipelineEvent, PipelineOutcome, PipelineStatus};
pub use error::{BuilderError, BuilderResult, ErrorKind};
pub use tools::{Tool, ToolDescription, ToolError, ToolSystem};
