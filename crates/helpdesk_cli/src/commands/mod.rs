//! CLI command definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod chat;
pub mod config;
pub mod detect;

/// helpdesk - AI-first support chat with human hand-off
#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(version, about = "helpdesk - AI-first support chat with human hand-off")]
#[command(long_about = r#"
helpdesk runs the chat engine locally: customers talk to an AI assistant and
are handed to a human agent when they ask for one.

COMMANDS:
  chat    → Interactive console playing customer, agent and admin
  detect  → Check whether a message asks for a human
  config  → Print the effective configuration

ENVIRONMENT:
  OPENAI_API_KEY, OPENAI_MODEL, OPENAI_BASE_URL, OPENAI_REQUEST_TIMEOUT,
  CHAT_RATE_LIMIT_MAX, CHAT_RATE_LIMIT_DECAY, HELPDESK_AI_WORKERS

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "HELPDESK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive helpdesk session
    Chat(chat::ChatArgs),

    /// Run transfer-intent detection on a message
    Detect(detect::DetectArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}
