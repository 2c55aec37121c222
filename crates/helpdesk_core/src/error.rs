//! Error types for the helpdesk core.

use thiserror::Error;

use crate::types::{ChatId, ChatStatus};

/// Result type alias for helpdesk operations.
pub type HelpdeskResult<T> = Result<T, HelpdeskError>;

/// Errors surfaced to the caller of an orchestrator operation.
///
/// Nothing is persisted when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HelpdeskError {
    #[error("{0}")]
    Validation(String),

    #[error("This chat has been resolved. Please create a new chat.")]
    ChatResolved,

    #[error("This chat has been closed. Please create a new chat.")]
    ChatClosed,

    #[error("Too many messages. Please wait {retry_after_secs} seconds.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(ChatId),

    #[error("Invalid chat transition: {from} -> {to}")]
    InvalidTransition { from: ChatStatus, to: ChatStatus },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl HelpdeskError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status an API binding should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::ChatResolved
            | Self::ChatClosed
            | Self::RateLimited { .. } => 422,
            Self::Forbidden(_) => 403,
            Self::ChatNotFound(_) => 404,
            Self::InvalidTransition { .. } => 409,
            Self::Storage(_) => 500,
        }
    }

    /// Seconds the caller should wait before retrying, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
