//! # helpdesk_runtime
//!
//! Runs the helpdesk engine: delivers orchestrator effects, executes AI
//! jobs on a worker pool, and fans events out to subscribers.
//!
//! # Features
//!
//! - **Channel Hub**: Per-chat and agent-pool channels on `tokio::sync::broadcast`
//! - **Dispatcher**: Ordered delivery of broadcasts and AI jobs
//! - **Worker Pool**: Background AI replies with panic-safe failure handling
//! - **Configuration**: TOML file plus environment overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use helpdesk_core::{Channel, Identity};
//! use helpdesk_runtime::{Helpdesk, HelpdeskConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let helpdesk = Helpdesk::builder(HelpdeskConfig::load(None)?).build()?;
//!     let ann = Identity::user(1, "Ann");
//!
//!     let detail = helpdesk.create_chat(&ann, "My invoice is wrong")?;
//!     let mut events = helpdesk.subscribe(Channel::Chat(detail.chat.id), &ann)?;
//!     if let Some(event) = events.recv().await {
//!         println!("{}: {:?}", event.event.name(), event.event);
//!     }
//!
//!     helpdesk.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod service;

pub use broadcast::{Broadcaster, ChannelHub, RecordingBroadcaster, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use config::{HelpdeskConfig, JobsConfig};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{RuntimeError, RuntimeResult};
pub use jobs::{job_channel, JobContext, JobQueue, JobReceiver, WorkerPool};
pub use service::{Helpdesk, HelpdeskBuilder};
