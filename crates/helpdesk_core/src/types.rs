//! Core types for the helpdesk chat engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a chat
    ChatId
);
id_type!(
    /// Identifier of a message
    MessageId
);
id_type!(
    /// Identifier of an authenticated user
    UserId
);

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    HelpdeskAgent,
    Admin,
}

impl UserRole {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::HelpdeskAgent => "Helpdesk Agent",
            Self::Admin => "Administrator",
        }
    }

    /// Agents and admins belong to the agent pool.
    pub fn is_helpdesk_agent(&self) -> bool {
        match self {
            Self::User => false,
            Self::HelpdeskAgent | Self::Admin => true,
        }
    }
}

/// The authenticated caller of an orchestrator operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
}

impl Identity {
    pub fn new(id: u64, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId(id),
            name: name.into(),
            role,
        }
    }

    /// End user shorthand
    pub fn user(id: u64, name: impl Into<String>) -> Self {
        Self::new(id, name, UserRole::User)
    }

    /// Helpdesk agent shorthand
    pub fn agent(id: u64, name: impl Into<String>) -> Self {
        Self::new(id, name, UserRole::HelpdeskAgent)
    }

    /// Admin shorthand
    pub fn admin(id: u64, name: impl Into<String>) -> Self {
        Self::new(id, name, UserRole::Admin)
    }

    pub fn is_helpdesk_agent(&self) -> bool {
        self.role.is_helpdesk_agent()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Lifecycle status of a chat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// Waiting for the next user message or an AI reply
    Open,
    /// An AI job is producing a reply
    AiHandling,
    /// The user asked for a human; waiting in the agent queue
    Transferred,
    /// A human agent has claimed the chat
    AgentHandling,
    /// Finished by an agent or admin
    Resolved,
    /// Administratively closed
    Closed,
}

impl ChatStatus {
    pub const ALL: [ChatStatus; 6] = [
        Self::Open,
        Self::AiHandling,
        Self::Transferred,
        Self::AgentHandling,
        Self::Resolved,
        Self::Closed,
    ];

    /// Stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::AiHandling => "ai_handling",
            Self::Transferred => "transferred",
            Self::AgentHandling => "agent_handling",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::AiHandling => "AI Handling",
            Self::Transferred => "Transferred",
            Self::AgentHandling => "Agent Handling",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ChatStatus) -> bool {
        use ChatStatus::*;
        match (*self, next) {
            (Resolved | Closed, _) => false,
            (Open, AiHandling) | (AiHandling, Open) => true,
            (Open | AiHandling, Transferred) => true,
            (_, AgentHandling) => true,
            (_, Resolved) => true,
            (_, Closed) => true,
            (Transferred | AgentHandling, Open | AiHandling | Transferred) => false,
            (Open, Open) | (AiHandling, AiHandling) => false,
        }
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Ai,
    Agent,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Ai => "AI",
            Self::Agent => "Agent",
            Self::System => "System",
        }
    }

    /// AI and system messages never carry an author.
    pub fn is_authored(&self) -> bool {
        match self {
            Self::User | Self::Agent => true,
            Self::Ai | Self::System => false,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A helpdesk conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    /// Owner of the chat
    pub user_id: UserId,
    pub assigned_agent_id: Option<UserId>,
    pub status: ChatStatus,
    pub subject: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Whether new messages may still be appended.
    pub fn accepts_messages(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_agent_id.is_some()
    }
}

/// A single immutable chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// Author; `None` for AI and system messages
    pub user_id: Option<UserId>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub is_transfer_request: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for a chat row about to be inserted
#[derive(Debug, Clone)]
pub struct NewChat {
    pub user_id: UserId,
    pub status: ChatStatus,
    pub subject: String,
}

/// Fields for a message row about to be inserted
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub message_type: MessageType,
    pub content: String,
    pub is_transfer_request: bool,
}

impl NewMessage {
    /// Message written by a user or an agent
    pub fn authored(
        chat_id: ChatId,
        author: UserId,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            chat_id,
            user_id: Some(author),
            message_type,
            content: content.into(),
            is_transfer_request: false,
        }
    }

    /// AI reply
    pub fn ai(chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: None,
            message_type: MessageType::Ai,
            content: content.into(),
            is_transfer_request: false,
        }
    }

    /// System notice
    pub fn system(chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: None,
            message_type: MessageType::System,
            content: content.into(),
            is_transfer_request: false,
        }
    }

    pub fn with_transfer_request(mut self, flag: bool) -> Self {
        self.is_transfer_request = flag;
        self
    }
}

/// A chat with its latest message, used by list views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<Message>,
}

/// A chat with its full ordered transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatDetail {
    pub chat: Chat,
    pub messages: Vec<Message>,
}
