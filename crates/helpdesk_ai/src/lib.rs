//! # helpdesk_ai
//!
//! AI responder for the helpdesk.
//!
//! The responder builds a chat-completion request from the chat transcript,
//! calls a [`CompletionProvider`] with retries on transient failures, and
//! always returns text: a degraded apology replaces any provider failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use helpdesk_ai::{AiConfig, AiResponder, OpenAiProvider, Responder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AiConfig::default();
//!     let provider = OpenAiProvider::new("sk-...", &config)?;
//!     let responder = AiResponder::new(Arc::new(provider), config);
//!
//!     let reply = responder.generate_response("My order never arrived", &[]).await;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod responder;

pub use config::{AiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{AiError, AiResult};
pub use provider::{ChatRole, ChatTurn, CompletionProvider, CompletionRequest, OfflineProvider, OpenAiProvider};
pub use responder::{
    build_conversation, fallback_for, AiResponder, Responder, CONNECTION_FALLBACK, HISTORY_WINDOW,
    PROCESSING_FALLBACK, SYSTEM_PROMPT,
};
