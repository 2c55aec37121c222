//! AI responder: prompt assembly, retries and fallback replies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use helpdesk_core::{Message, MessageType};

use crate::config::AiConfig;
use crate::error::AiError;
use crate::provider::{ChatRole, ChatTurn, CompletionProvider, CompletionRequest};

pub const SYSTEM_PROMPT: &str = "You are a helpful customer support assistant. Be concise, \
professional, and empathetic. If you cannot help, suggest transferring to a human agent.";

/// History entries sent along with each request
pub const HISTORY_WINDOW: usize = 10;

pub const CONNECTION_FALLBACK: &str =
    "I'm having trouble connecting right now. Would you like to speak with a human agent?";

pub const PROCESSING_FALLBACK: &str =
    "I'm having trouble processing your request right now. Would you like to speak with a human agent?";

/// Produces the AI reply for a user message. Never fails.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate_response(&self, user_message: &str, history: &[Message]) -> String;
}

/// Map a transcript entry to its completion role.
pub fn role_for(message_type: MessageType) -> ChatRole {
    match message_type {
        MessageType::User | MessageType::Agent => ChatRole::User,
        MessageType::Ai | MessageType::System => ChatRole::Assistant,
    }
}

/// System prompt, the last [`HISTORY_WINDOW`] history entries, then the
/// new user message.
pub fn build_conversation(user_message: &str, history: &[Message]) -> Vec<ChatTurn> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut turns = Vec::with_capacity(history.len() - start + 2);
    turns.push(ChatTurn::new(ChatRole::System, SYSTEM_PROMPT));
    turns.extend(
        history[start..]
            .iter()
            .map(|m| ChatTurn::new(role_for(m.message_type), m.content.clone())),
    );
    turns.push(ChatTurn::new(ChatRole::User, user_message));
    turns
}

/// Degraded reply for a failed completion.
pub fn fallback_for(error: &AiError) -> &'static str {
    if error.is_connection() {
        CONNECTION_FALLBACK
    } else {
        PROCESSING_FALLBACK
    }
}

/// Responder backed by a [`CompletionProvider`].
pub struct AiResponder {
    provider: Arc<dyn CompletionProvider>,
    config: AiConfig,
}

impl AiResponder {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: AiConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn request(&self, user_message: &str, history: &[Message]) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: build_conversation(user_message, history),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Call the provider, retrying transient failures with linear backoff.
    pub async fn complete_with_retry(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }

            match self.provider.complete(request).await {
                Ok(content) => return Ok(content),
                Err(err) if err.is_retryable() => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "Completion failed, retrying"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(AiError::EmptyCompletion))
    }
}

#[async_trait]
impl Responder for AiResponder {
    async fn generate_response(&self, user_message: &str, history: &[Message]) -> String {
        let request = self.request(user_message, history);
        debug!(model = %request.model, turns = request.messages.len(), "Requesting completion");

        match self.complete_with_retry(&request).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "AI completion failed, using fallback reply");
                fallback_for(&err).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockCompletionProvider;
    use chrono::Utc;
    use helpdesk_core::{ChatId, MessageId};

    fn message(id: u64, message_type: MessageType, content: &str) -> Message {
        Message {
            id: MessageId(id),
            chat_id: ChatId(1),
            user_id: None,
            message_type,
            content: content.to_string(),
            is_transfer_request: false,
            created_at: Utc::now(),
        }
    }

    fn fast_config() -> AiConfig {
        AiConfig {
            backoff_ms: 1,
            ..AiConfig::default()
        }
    }

    #[test]
    fn test_conversation_keeps_last_ten_entries() {
        let history: Vec<_> = (0..15)
            .map(|i| message(i, MessageType::User, &format!("m{i}")))
            .collect();
        let turns = build_conversation("now", &history);
        assert_eq!(turns.len(), 12);
        assert_eq!(turns[0].role, ChatRole::System);
        assert_eq!(turns[1].content, "m5");
        assert_eq!(turns[11], ChatTurn::new(ChatRole::User, "now"));
    }

    #[test]
    fn test_roles_follow_message_type() {
        let history = vec![
            message(1, MessageType::User, "u"),
            message(2, MessageType::Ai, "a"),
            message(3, MessageType::Agent, "g"),
            message(4, MessageType::System, "s"),
        ];
        let roles: Vec<_> = build_conversation("x", &history)
            .into_iter()
            .map(|t| t.role)
            .collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
            ]
        );
    }

    #[tokio::test]
    async fn test_success_returns_completion() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .withf(|request| request.model == "gpt-4o-mini" && request.max_tokens == 500)
            .times(1)
            .returning(|_| Ok("Happy to help".to_string()));

        let responder = AiResponder::new(Arc::new(provider), fast_config());
        assert_eq!(responder.generate_response("hi", &[]).await, "Happy to help");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut provider = MockCompletionProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_complete()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(AiError::Status {
                    status: 503,
                    body: "busy".into(),
                })
            });
        provider
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Third time lucky".to_string()));

        let responder = AiResponder::new(Arc::new(provider), fast_config());
        assert_eq!(responder.generate_response("hi", &[]).await, "Third time lucky");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().times(1).returning(|_| {
            Err(AiError::Status {
                status: 401,
                body: "bad key".into(),
            })
        });

        let responder = AiResponder::new(Arc::new(provider), fast_config());
        assert_eq!(responder.generate_response("hi", &[]).await, PROCESSING_FALLBACK);
    }

    #[tokio::test]
    async fn test_rate_limit_response_is_final() {
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().times(1).returning(|_| {
            Err(AiError::Status {
                status: 429,
                body: "slow down".into(),
            })
        });

        let responder = AiResponder::new(Arc::new(provider), fast_config());
        assert_eq!(responder.generate_response("hi", &[]).await, PROCESSING_FALLBACK);
    }

    #[tokio::test]
    async fn test_exhausted_connection_retries_use_connection_fallback() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .times(3)
            .returning(|_| Err(AiError::Connection("refused".into())));

        let responder = AiResponder::new(Arc::new(provider), fast_config());
        assert_eq!(responder.generate_response("hi", &[]).await, CONNECTION_FALLBACK);
    }

    #[tokio::test]
    async fn test_empty_completion_uses_processing_fallback() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_| Err(AiError::EmptyCompletion));

        let responder = AiResponder::new(Arc::new(provider), fast_config());
        assert_eq!(responder.generate_response("hi", &[]).await, PROCESSING_FALLBACK);
    }
}
