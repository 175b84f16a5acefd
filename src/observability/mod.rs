//! Observability for pipeline runs
//!
//! Structured logging through `tracing`; see [`logging`] for the environment
//! variables that control it.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
