//! Outbound effects produced by orchestrator operations.
//!
//! Operations never publish or enqueue anything themselves. They return an
//! [`Outcome`] carrying the ordered list of [`Outbound`] effects, and a
//! dispatcher delivers them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Chat, ChatId, ChatStatus, Message, MessageId, MessageType, UserId};

/// Name of the role-scoped channel for transfer alerts.
pub const HELPDESK_AGENTS_CHANNEL: &str = "helpdesk-agents";

/// A publish/subscribe channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Private per-chat channel, `chat.{id}`
    Chat(ChatId),
    /// Agent pool channel
    HelpdeskAgents,
}

impl Channel {
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "chat.{}", id),
            Self::HelpdeskAgents => f.write_str(HELPDESK_AGENTS_CHANNEL),
        }
    }
}

/// Message as pushed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePayload {
    pub id: MessageId,
    pub chat_id: ChatId,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub user_id: Option<UserId>,
    pub is_transfer_request: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePayload {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            message_type: message.message_type,
            content: message.content.clone(),
            user_id: message.user_id,
            is_transfer_request: message.is_transfer_request,
            created_at: message.created_at,
        }
    }
}

/// Chat as pushed to the agent pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatPayload {
    pub id: ChatId,
    pub user_id: UserId,
    pub status: ChatStatus,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Chat> for ChatPayload {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id,
            user_id: chat.user_id,
            status: chat.status,
            subject: chat.subject.clone(),
            created_at: chat.created_at,
        }
    }
}

/// Event body; serializes to `{"message": ...}` or `{"chat": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BroadcastEvent {
    MessageSent { message: MessagePayload },
    TransferRequested { chat: ChatPayload },
}

impl BroadcastEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageSent { .. } => "message.sent",
            Self::TransferRequested { .. } => "chat.transfer-requested",
        }
    }
}

/// One event bound for one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Broadcast {
    pub channel: Channel,
    pub event: BroadcastEvent,
    /// Subscriber that must not receive the event (the sender)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub except: Option<UserId>,
}

impl Broadcast {
    /// New message for everyone on the chat channel.
    pub fn message_sent(message: &Message) -> Self {
        Self {
            channel: Channel::Chat(message.chat_id),
            event: BroadcastEvent::MessageSent {
                message: message.into(),
            },
            except: None,
        }
    }

    /// New message for everyone except its author.
    pub fn message_sent_to_others(message: &Message, sender: UserId) -> Self {
        Self {
            except: Some(sender),
            ..Self::message_sent(message)
        }
    }

    /// Transfer alert for the agent pool.
    pub fn transfer_requested(chat: &Chat) -> Self {
        Self {
            channel: Channel::HelpdeskAgents,
            event: BroadcastEvent::TransferRequested { chat: chat.into() },
            except: None,
        }
    }

    /// Whether `subscriber` should receive this broadcast.
    pub fn is_visible_to(&self, subscriber: Option<UserId>) -> bool {
        match (self.except, subscriber) {
            (Some(excluded), Some(subscriber)) => excluded != subscriber,
            _ => true,
        }
    }
}

/// Request to generate an AI reply off the request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiJob {
    pub id: Uuid,
    pub chat_id: ChatId,
    /// The user message the reply answers
    pub user_message: String,
}

impl AiJob {
    pub fn new(chat_id: ChatId, user_message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            user_message: user_message.into(),
        }
    }
}

/// A side effect for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Broadcast(Broadcast),
    ScheduleAiResponse(AiJob),
}

/// Result of an orchestrator operation plus its side effects, in order.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub outbound: Vec<Outbound>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            outbound: Vec::new(),
        }
    }

    pub fn broadcast(mut self, broadcast: Broadcast) -> Self {
        self.outbound.push(Outbound::Broadcast(broadcast));
        self
    }

    pub fn schedule(mut self, job: AiJob) -> Self {
        self.outbound.push(Outbound::ScheduleAiResponse(job));
        self
    }

    pub fn broadcasts(&self) -> impl Iterator<Item = &Broadcast> {
        self.outbound.iter().filter_map(|effect| match effect {
            Outbound::Broadcast(broadcast) => Some(broadcast),
            Outbound::ScheduleAiResponse(_) => None,
        })
    }

    pub fn ai_jobs(&self) -> impl Iterator<Item = &AiJob> {
        self.outbound.iter().filter_map(|effect| match effect {
            Outbound::ScheduleAiResponse(job) => Some(job),
            Outbound::Broadcast(_) => None,
        })
    }

    pub fn into_parts(self) -> (T, Vec<Outbound>) {
        (self.value, self.outbound)
    }
}
