//! sitewright - command line entry point

use clap::{Parser, Subcommand};
use futures::StreamExt;
use sitewright::config::BuilderConfig;
use sitewright::error::{BuilderError, BuilderResult};
use sitewright::developer::{Phase, PipelineController, PipelineStatus, TaskList};
use sitewright::llm::providers::{OpenAiConfig, OpenAiProvider, DEEPSEEK_BASE_URL};
use sitewright::llm::LlmProvider;
use sitewright::observability::{init_default_logging, init_logging, LogFormat};
use sitewright::session::{FileSessionStore, SessionStore};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, Level};

/// Drive an LLM developer agent through a website build plan
#[derive(Parser)]
#[command(name = "sitewright")]
#[command(about = "Task execution engine for LLM-built static websites")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every task in a plan
    Run {
        /// Planner output containing the task list
        #[arg(long, value_name = "FILE")]
        tasks: PathBuf,

        /// Record progress in this session
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
    /// Parse a plan and print its tasks
    Plan {
        #[arg(long, value_name = "FILE")]
        tasks: PathBuf,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        1 => init_logging(Level::DEBUG, LogFormat::Compact, false),
        _ => init_logging(Level::TRACE, LogFormat::Compact, true),
    }

    debug!("sitewright v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Run { tasks, session } => {
            match load_configuration(&cli.config) {
                Ok(config) => run_pipeline(config, &tasks, session).await,
                Err(e) => Err(e),
            }
        }
        Commands::Plan { tasks } => show_plan(&tasks),
        Commands::Config { show } => {
            load_configuration(&cli.config).and_then(|config| handle_config_command(config, show))
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Command failed: {}", e);
            process::exit(1);
        }
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> BuilderResult<BuilderConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(BuilderConfig::load_from_file(path)?);
    }

    for path_str in ["sitewright.toml", "config/sitewright.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(BuilderConfig::load_from_file(&path)?);
        }
    }

    Err(BuilderError::invalid_input(
        "No configuration file found. Provide one with -c/--config or create sitewright.toml",
    ))
}

/// Build the Completion Client from configuration
fn create_provider(config: &BuilderConfig) -> BuilderResult<Arc<dyn LlmProvider>> {
    match config.llm.provider.as_str() {
        "openai" | "deepseek" => {
            let openai_config = OpenAiConfig {
                api_key: config.get_llm_api_key()?,
                base_url: config
                    .llm
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEEPSEEK_BASE_URL.to_string()),
                timeout: Duration::from_secs(config.llm.timeout_secs),
            };
            Ok(Arc::new(OpenAiProvider::new(openai_config)?))
        }
        provider => Err(BuilderError::invalid_input(format!(
            "Unsupported LLM provider: {provider}"
        ))),
    }
}

async fn run_pipeline(
    config: BuilderConfig,
    tasks_path: &Path,
    session: Option<String>,
) -> BuilderResult<i32> {
    let plan_output = read_plan(tasks_path)?;
    let (tasks, status) = TaskList::from_plan_output_or_empty(&plan_output);
    info!(tasks = tasks.len(), status = %status, "Loaded plan from {}", tasks_path.display());

    let provider = create_provider(&config)?;
    let mut controller = PipelineController::from_config(&config, provider, tasks, status).await?;

    if let Some(session_id) = session {
        let store = FileSessionStore::open_dir(&config.session.store_dir).await?;
        let record = store.open(&session_id).await?;
        info!(session_id = %record.id, "Recording progress to session");
        controller = controller.with_session(Arc::new(store), record.id);
    }

    let events = controller.start();
    futures::pin_mut!(events);

    let mut finished: Option<(PipelineStatus, String)> = None;

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                info!(
                    phase = %event.phase,
                    cursor = event.snapshot.cursor,
                    task_count = event.snapshot.task_count,
                    task_id = event.snapshot.current_task_id.as_deref().unwrap_or("-"),
                    history_len = event.snapshot.history_len,
                    "Pipeline step"
                );
                if event.phase == Phase::Done {
                    finished = Some((event.snapshot.status, event.snapshot.summary.unwrap_or_default()));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                error!("Interrupted, stopping pipeline");
                return Ok(130);
            }
        }
    }

    let Some((status, summary)) = finished else {
        return Err(BuilderError::internal_error(
            "Pipeline event stream ended without a done event",
        ));
    };

    println!("{summary}");
    Ok(if status == PipelineStatus::Completed { 0 } else { 1 })
}

fn read_plan(tasks_path: &Path) -> BuilderResult<String> {
    std::fs::read_to_string(tasks_path).map_err(|e| {
        BuilderError::invalid_input(format!(
            "Cannot read plan file {}: {e}",
            tasks_path.display()
        ))
    })
}

fn show_plan(tasks_path: &Path) -> BuilderResult<i32> {
    let plan_output = read_plan(tasks_path)?;
    let tasks = TaskList::from_plan_output(&plan_output)?;

    for (index, task) in tasks.iter().enumerate() {
        println!("{}. [{}] {}", index + 1, task.id, task.title);
        if !task.files.is_empty() {
            println!("   files: {}", task.files.join(", "));
        }
    }
    println!("{} task(s)", tasks.len());
    Ok(0)
}

fn handle_config_command(config: BuilderConfig, show: bool) -> BuilderResult<i32> {
    info!("Configuration is valid");
    if show {
        let rendered = toml::to_string_pretty(&config).map_err(|e| {
            BuilderError::internal_error(format!("Cannot render configuration: {e}"))
        })?;
        println!("{rendered}");
    }
    Ok(0)
}
