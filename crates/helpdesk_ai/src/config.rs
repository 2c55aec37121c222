//! Completion settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings for the AI responder and its provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// API key; `None` runs the responder offline
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Attempts per reply, including the first
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * backoff_ms`
    pub backoff_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_ms: 100,
        }
    }
}

impl AiConfig {
    /// Whether a usable API key is present.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms * u64::from(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_blank_key_is_not_a_key() {
        let config = AiConfig {
            api_key: Some("  ".into()),
            ..AiConfig::default()
        };
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let config = AiConfig {
            api_key: Some("sk-secret".into()),
            ..AiConfig::default()
        };
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
    }
}
