//! Runtime configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables:
//!
//! | Variable                  | Setting                        |
//! |---------------------------|--------------------------------|
//! | `CHAT_RATE_LIMIT_MAX`     | `rate_limit.max_messages`      |
//! | `CHAT_RATE_LIMIT_DECAY`   | `rate_limit.decay_seconds`     |
//! | `OPENAI_API_KEY`          | `ai.api_key`                   |
//! | `OPENAI_MODEL`            | `ai.model`                     |
//! | `OPENAI_BASE_URL`         | `ai.base_url`                  |
//! | `OPENAI_REQUEST_TIMEOUT`  | `ai.request_timeout_secs`      |
//! | `HELPDESK_AI_WORKERS`     | `jobs.workers`                 |

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use helpdesk_ai::AiConfig;
use helpdesk_core::{RateLimitConfig, MAX_DECAY_SECONDS};

use crate::error::{RuntimeError, RuntimeResult};

/// AI job worker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Concurrent AI jobs
    pub workers: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

/// Complete helpdesk configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpdeskConfig {
    pub rate_limit: RateLimitConfig,
    pub ai: AiConfig,
    pub jobs: JobsConfig,
}

impl HelpdeskConfig {
    /// Load from an optional file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> RuntimeResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> RuntimeResult<Self> {
        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> RuntimeResult<Self> {
        toml::from_str(content).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> RuntimeResult<String> {
        toml::to_string_pretty(self).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> RuntimeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("CHAT_RATE_LIMIT_MAX") {
            self.rate_limit.max_messages = parse("CHAT_RATE_LIMIT_MAX", &value)?;
        }
        if let Some(value) = get("CHAT_RATE_LIMIT_DECAY") {
            self.rate_limit.decay_seconds = parse("CHAT_RATE_LIMIT_DECAY", &value)?;
        }
        if let Some(value) = get("OPENAI_API_KEY") {
            self.ai.api_key = Some(value);
        }
        if let Some(value) = get("OPENAI_MODEL") {
            self.ai.model = value;
        }
        if let Some(value) = get("OPENAI_BASE_URL") {
            self.ai.base_url = value;
        }
        if let Some(value) = get("OPENAI_REQUEST_TIMEOUT") {
            self.ai.request_timeout_secs = parse("OPENAI_REQUEST_TIMEOUT", &value)?;
        }
        if let Some(value) = get("HELPDESK_AI_WORKERS") {
            self.jobs.workers = parse("HELPDESK_AI_WORKERS", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.rate_limit.max_messages == 0 {
            return Err(RuntimeError::Config(
                "rate_limit.max_messages must be at least 1".into(),
            ));
        }
        if self.rate_limit.decay_seconds == 0 {
            return Err(RuntimeError::Config(
                "rate_limit.decay_seconds must be at least 1".into(),
            ));
        }
        if self.rate_limit.decay_seconds > MAX_DECAY_SECONDS {
            return Err(RuntimeError::Config(format!(
                "rate_limit.decay_seconds must be at most {MAX_DECAY_SECONDS}"
            )));
        }
        if self.jobs.workers == 0 {
            return Err(RuntimeError::Config("jobs.workers must be at least 1".into()));
        }
        if self.ai.max_attempts == 0 {
            return Err(RuntimeError::Config("ai.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> RuntimeResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RuntimeError::Config(format!("{key}: invalid value '{value}'")))
}
