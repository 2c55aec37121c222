//! Error types for completion calls.

use thiserror::Error;

/// Errors raised while talking to a completion provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Invalid provider configuration: {0}")]
    Config(String),
}

impl AiError {
    /// Network errors, timeouts and 5xx are worth another attempt. Client
    /// errors (4xx, 429 included) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500,
            Self::EmptyCompletion | Self::Decode(_) | Self::Config(_) => false,
        }
    }

    /// The provider could not be reached at all. Timeouts count.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

pub type AiResult<T> = Result<T, AiError>;
