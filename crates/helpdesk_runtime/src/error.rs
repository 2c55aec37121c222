//! Error types for the helpdesk runtime.

use thiserror::Error;

use helpdesk_core::HelpdeskError;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by the runtime around the orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI job queue is closed")]
    QueueClosed,

    #[error("AI job failed: {0}")]
    Job(String),

    #[error(transparent)]
    Core(#[from] HelpdeskError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
