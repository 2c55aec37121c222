//! # helpdesk_core
//!
//! Chat lifecycle and hand-off engine for the helpdesk.
//!
//! A customer opens a chat, an AI assistant answers in the background, and
//! the conversation moves to a human agent when the customer asks for one.
//!
//! ## Key Features
//!
//! - **State Machine**: Closed [`ChatStatus`] transitions, terminal states enforced
//! - **Transfer Detection**: Keyword heuristic for "let me talk to a human"
//! - **Rate Limiting**: Per (chat, user) windows with atomic check-and-hit
//! - **Effects as Data**: Operations return an [`Outcome`] listing broadcasts
//!   and AI jobs instead of performing them
//! - **Access Policy**: Owner and agent visibility rules
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Identity   │────▶│ Orchestrator │────▶│  ChatStore   │
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │  Outcome<T>  │──▶ broadcasts, AI jobs
//!                      └──────────────┘
//! ```

pub mod api;
pub mod clock;
pub mod error;
pub mod events;
pub mod intent;
pub mod orchestrator;
pub mod policy;
pub mod rate_limit;
pub mod sanitize;
pub mod store;
pub mod types;

pub use api::ApiEnvelope;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HelpdeskError, HelpdeskResult};
pub use events::{
    AiJob, Broadcast, BroadcastEvent, Channel, ChatPayload, MessagePayload, Outbound, Outcome,
    HELPDESK_AGENTS_CHANNEL,
};
pub use intent::{matched_keyword, should_transfer_to_human, TRANSFER_KEYWORDS};
pub use orchestrator::{Orchestrator, AI_UNAVAILABLE_NOTICE, TRANSFER_NOTICE};
pub use policy::AccessPolicy;
pub use rate_limit::{RateLimitConfig, RateLimitKey, RateLimiter, MAX_DECAY_SECONDS};
pub use sanitize::{escape_html, sanitize_input, sanitize_message, subject_from};
pub use store::{ChatStore, InMemoryChatStore};
pub use types::*;
