//! Configuration system for the sitewright pipeline
//!
//! Loaded from a TOML file. API keys are never stored in the file; the
//! configuration only names the environment variable that holds them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default advisory content budget per tool call, in characters
pub const DEFAULT_MAX_TOOL_CONTENT_CHARS: usize = 1500;

/// Main builder configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuilderConfig {
    pub project: ProjectSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub session: SessionSection,
    /// Per-tool configuration tables, passed to `Tool::initialize`
    #[serde(default)]
    pub tools: HashMap<String, toml::Table>,
}

/// Project section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSection {
    /// Fixed project identifier (must match [a-zA-Z0-9._-]+)
    pub name: String,
    /// Sandbox root for every file tool
    pub workspace: PathBuf,
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name; only OpenAI-compatible endpoints are supported
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Override of the chat-completions base URL
    pub base_url: Option<String>,
    /// Override of the developer system prompt
    pub system_prompt: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds (default: 120)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

/// Pipeline section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSection {
    /// Advisory per-call content budget stated in instruction text
    #[serde(default = "default_max_tool_content_chars")]
    pub max_tool_content_chars: usize,
}

fn default_max_tool_content_chars() -> usize {
    DEFAULT_MAX_TOOL_CONTENT_CHARS
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_tool_content_chars: DEFAULT_MAX_TOOL_CONTENT_CHARS,
        }
    }
}

/// Session persistence section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Directory holding one JSON file per session
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".sitewright/sessions")
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid project name: {0}")]
    InvalidProjectName(String),
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BuilderConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BuilderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_project_name(&self.project.name)?;

        if !SUPPORTED_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::UnsupportedProvider(self.llm.provider.clone()));
        }

        if self.pipeline.max_tool_content_chars == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.max_tool_content_chars must be greater than zero".to_string(),
            ));
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }

        Ok(())
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }

    /// Tool configuration tables converted to JSON for `Tool::initialize`
    pub fn tool_configs(&self) -> HashMap<String, serde_json::Value> {
        self.tools
            .iter()
            .filter_map(|(name, table)| {
                serde_json::to_value(table)
                    .ok()
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[project]
name = "test-site"
workspace = "/tmp/test-site"

[llm]
provider = "openai"
model = "deepseek-chat"
api_key_env = "DEEPSEEK_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

const SUPPORTED_PROVIDERS: &[&str] = &["openai", "deepseek"];

/// Validate project name format
fn validate_project_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidProjectName(format!(
            "Project name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
