//! Crate-level error types for the sitewright pipeline
//!
//! Each subsystem owns its own error enum; `BuilderError` aggregates them so
//! callers outside the core can classify failures with [`ErrorKind`] without
//! the core knowing anything about the transport that reports them.

use thiserror::Error;

/// Main error type for sitewright operations
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("Plan error: {0}")]
    Plan(#[from] crate::developer::task::PlanError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("Sequencing error: {0}")]
    Sequencing(#[from] crate::developer::sequencer::SequencingError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

/// Coarse classification an outer layer can map onto its own status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Upstream,
    Internal,
}

impl BuilderError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        use crate::session::SessionError;

        match self {
            BuilderError::Session(SessionError::NotFound(_)) => ErrorKind::NotFound,
            BuilderError::Config(_) | BuilderError::Plan(_) | BuilderError::InvalidInput { .. } => {
                ErrorKind::InvalidInput
            }
            BuilderError::Llm(_) => ErrorKind::Upstream,
            BuilderError::Tool(_)
            | BuilderError::Session(_)
            | BuilderError::Sequencing(_)
            | BuilderError::InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Sanitize error text before it is written into conversation history or snapshots
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    // Remove common secret patterns
    if let Ok(secrets) = regex::Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+") {
        sanitized = secrets.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Ok(bearer) = regex::Regex::new(r"(?i)bearer\s+[a-z0-9._\-]+") {
        sanitized = bearer.replace_all(&sanitized, "Bearer ***").to_string();
    }

    // Remove potential file paths that might contain sensitive info
    if let Ok(paths) =
        regex::Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
    {
        sanitized = paths.replace_all(&sanitized, "/***REDACTED***/").to_string();
    }

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for sitewright operations
pub type BuilderResult<T> = Result<T, BuilderError>;
