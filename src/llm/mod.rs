//! LLM provider abstraction layer
//!
//! Provider-agnostic interface for the Completion Client plus the
//! OpenAI-compatible adapter used in production.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
