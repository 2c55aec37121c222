//! Chat orchestrator: the chat lifecycle state machine.
//!
//! Every mutating operation goes through the [`ChatStore`] and returns an
//! [`Outcome`] listing the broadcasts and AI jobs it wants delivered. The
//! orchestrator itself never publishes or spawns anything.
//!
//! ```text
//!  open ──▶ ai_handling ──▶ open
//!   │            │
//!   └──────┬─────┘
//!          ▼
//!     transferred ──▶ agent_handling ──▶ resolved
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{HelpdeskError, HelpdeskResult};
use crate::events::{AiJob, Broadcast, Outcome};
use crate::intent;
use crate::policy::AccessPolicy;
use crate::rate_limit::{RateLimitKey, RateLimiter};
use crate::sanitize::{sanitize_message, subject_from};
use crate::store::ChatStore;
use crate::types::{
    Chat, ChatDetail, ChatId, ChatStatus, ChatSummary, Identity, Message, MessageType, NewChat,
    NewMessage,
};

/// System notice posted when a user asks for a human.
pub const TRANSFER_NOTICE: &str =
    "User requested transfer to human agent. An agent will be with you shortly.";

/// System notice posted when an AI job fails.
pub const AI_UNAVAILABLE_NOTICE: &str =
    "AI service is temporarily unavailable. Please try again or request a human agent.";

fn agent_joined_notice(agent: &Identity) -> String {
    format!("Agent {} has joined the chat", agent.name)
}

fn resolved_notice(resolver: &Identity) -> String {
    format!("Chat resolved by {}", resolver.name)
}

fn closed_notice(admin: &Identity) -> String {
    format!("Chat closed by {}", admin.name)
}

/// Business rules for chats and messages.
pub struct Orchestrator {
    store: Arc<dyn ChatStore>,
    limiter: Arc<RateLimiter>,
    policy: AccessPolicy,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ChatStore>, limiter: Arc<RateLimiter>) -> Self {
        Self::with_clock(store, limiter, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn ChatStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            limiter,
            policy: AccessPolicy,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    fn load_chat(&self, chat_id: ChatId) -> HelpdeskResult<Chat> {
        self.store
            .find_chat(chat_id)?
            .ok_or(HelpdeskError::ChatNotFound(chat_id))
    }

    fn ensure_transition(chat: &Chat, next: ChatStatus) -> HelpdeskResult<()> {
        if chat.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(HelpdeskError::InvalidTransition {
                from: chat.status,
                to: next,
            })
        }
    }

    fn system_message(&self, chat_id: ChatId, content: impl Into<String>) -> HelpdeskResult<Message> {
        self.store.append_message(NewMessage::system(chat_id, content))
    }

    // =========================================================================
    // User-facing operations
    // =========================================================================

    /// Open a chat with its first message and request an AI reply.
    pub fn create_chat(
        &self,
        user: &Identity,
        initial_message: &str,
    ) -> HelpdeskResult<Outcome<ChatDetail>> {
        let content = sanitize_message(initial_message)?;

        let (chat, message) = self.store.create_chat(
            NewChat {
                user_id: user.id,
                status: ChatStatus::Open,
                subject: subject_from(&content),
            },
            NewMessage::authored(chat_placeholder(), user.id, MessageType::User, content.clone()),
        )?;
        info!(chat_id = %chat.id, user_id = %user.id, "Chat created");

        let job = AiJob::new(chat.id, content);
        Ok(Outcome::new(ChatDetail {
            chat,
            messages: vec![message],
        })
        .schedule(job))
    }

    /// Append a message from a user or an agent and route it.
    pub fn send_message(
        &self,
        chat_id: ChatId,
        author: &Identity,
        content: &str,
    ) -> HelpdeskResult<Outcome<Message>> {
        let chat = self.load_chat(chat_id)?;
        match chat.status {
            ChatStatus::Resolved => return Err(HelpdeskError::ChatResolved),
            ChatStatus::Closed => return Err(HelpdeskError::ChatClosed),
            ChatStatus::Open
            | ChatStatus::AiHandling
            | ChatStatus::Transferred
            | ChatStatus::AgentHandling => {}
        }

        let content = sanitize_message(content)?;
        let is_agent = author.is_helpdesk_agent();
        if !is_agent {
            self.limiter
                .check_and_hit(RateLimitKey::new(chat.id, author.id))?;
        }

        let message_type = if is_agent {
            MessageType::Agent
        } else {
            MessageType::User
        };
        let keyword = if is_agent {
            None
        } else {
            intent::matched_keyword(&content)
        };
        let is_transfer_request = keyword.is_some();

        let message = self.store.append_message(
            NewMessage::authored(chat.id, author.id, message_type, content.clone())
                .with_transfer_request(is_transfer_request),
        )?;
        debug!(
            chat_id = %chat.id,
            message_id = %message.id,
            message_type = %message_type,
            "Message stored"
        );

        let echo = Broadcast::message_sent_to_others(&message, author.id);
        let mut outcome = Outcome::new(message).broadcast(echo);

        if let Some(keyword) = keyword {
            if chat.status.can_transition_to(ChatStatus::Transferred) {
                info!(chat_id = %chat.id, keyword, "Transfer to human requested");
                outcome = self.request_transfer(&chat, outcome)?;
            } else {
                debug!(
                    chat_id = %chat.id,
                    status = %chat.status,
                    "Transfer keyword in a chat already with the agent pool"
                );
            }
        } else if !is_agent && matches!(chat.status, ChatStatus::Open | ChatStatus::AiHandling) {
            outcome = outcome.schedule(AiJob::new(chat.id, content));
        }

        Ok(outcome)
    }

    /// Reply from an agent or admin.
    pub fn agent_reply(
        &self,
        chat_id: ChatId,
        agent: &Identity,
        content: &str,
    ) -> HelpdeskResult<Outcome<Message>> {
        self.policy.require_agent(agent)?;
        self.send_message(chat_id, agent, content)
    }

    fn request_transfer(
        &self,
        chat: &Chat,
        outcome: Outcome<Message>,
    ) -> HelpdeskResult<Outcome<Message>> {
        let chat = self.store.update_status(chat.id, ChatStatus::Transferred)?;
        let notice = self.system_message(chat.id, TRANSFER_NOTICE)?;
        Ok(outcome
            .broadcast(Broadcast::message_sent(&notice))
            .broadcast(Broadcast::transfer_requested(&chat)))
    }

    /// An agent claims the chat.
    ///
    /// Claiming a chat already held by another agent succeeds and replaces
    /// the assignment.
    pub fn assign_to_agent(&self, chat_id: ChatId, agent: &Identity) -> HelpdeskResult<Outcome<Chat>> {
        self.policy.require_agent(agent)?;
        let chat = self.load_chat(chat_id)?;
        Self::ensure_transition(&chat, ChatStatus::AgentHandling)?;
        if let Some(previous) = chat.assigned_agent_id.filter(|id| *id != agent.id) {
            warn!(chat_id = %chat.id, previous = %previous, agent_id = %agent.id, "Chat reassigned");
        }

        let chat = self.store.assign_agent(chat.id, agent.id)?;
        let notice = self.system_message(chat.id, agent_joined_notice(agent))?;
        info!(chat_id = %chat.id, agent_id = %agent.id, "Chat assigned");
        Ok(Outcome::new(chat).broadcast(Broadcast::message_sent(&notice)))
    }

    /// Mark the chat resolved.
    pub fn resolve_chat(&self, chat_id: ChatId, resolver: &Identity) -> HelpdeskResult<Outcome<Chat>> {
        self.policy.require_agent(resolver)?;
        let chat = self.load_chat(chat_id)?;
        Self::ensure_transition(&chat, ChatStatus::Resolved)?;

        let chat = self.store.resolve(chat.id, self.clock.now())?;
        let notice = self.system_message(chat.id, resolved_notice(resolver))?;
        info!(chat_id = %chat.id, resolver_id = %resolver.id, "Chat resolved");
        Ok(Outcome::new(chat).broadcast(Broadcast::message_sent(&notice)))
    }

    /// Administratively close the chat.
    pub fn close_chat(&self, chat_id: ChatId, admin: &Identity) -> HelpdeskResult<Outcome<Chat>> {
        self.policy.require_admin(admin)?;
        let chat = self.load_chat(chat_id)?;
        Self::ensure_transition(&chat, ChatStatus::Closed)?;

        let chat = self.store.update_status(chat.id, ChatStatus::Closed)?;
        let notice = self.system_message(chat.id, closed_notice(admin))?;
        info!(chat_id = %chat.id, admin_id = %admin.id, "Chat closed");
        Ok(Outcome::new(chat).broadcast(Broadcast::message_sent(&notice)))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Chats owned by the user, newest first.
    pub fn user_chats(&self, user: &Identity) -> HelpdeskResult<Vec<ChatSummary>> {
        self.store.chats_for_user(user.id)
    }

    /// Chats the agent is working on.
    pub fn agent_chats(&self, agent: &Identity) -> HelpdeskResult<Vec<ChatSummary>> {
        self.store.chats_for_agent(agent.id)
    }

    /// Pickup queue for the agent pool, oldest first.
    pub fn unassigned_chats(&self) -> HelpdeskResult<Vec<ChatSummary>> {
        self.store.unassigned_chats()
    }

    pub fn chat(&self, chat_id: ChatId) -> HelpdeskResult<Chat> {
        self.load_chat(chat_id)
    }

    pub fn chat_detail(&self, chat_id: ChatId) -> HelpdeskResult<ChatDetail> {
        self.store
            .chat_detail(chat_id)?
            .ok_or(HelpdeskError::ChatNotFound(chat_id))
    }

    pub fn messages(&self, chat_id: ChatId) -> HelpdeskResult<Vec<Message>> {
        self.store.messages(chat_id)
    }

    // =========================================================================
    // AI job hooks
    // =========================================================================

    /// Start an AI turn: move the chat to `ai_handling` and return the
    /// transcript that precedes the triggering message.
    ///
    /// Returns `None` when the chat no longer accepts messages.
    pub fn begin_ai_response(&self, job: &AiJob) -> HelpdeskResult<Option<Vec<Message>>> {
        let chat = self.load_chat(job.chat_id)?;
        if chat.status.is_terminal() {
            info!(chat_id = %chat.id, job_id = %job.id, status = %chat.status, "Dropping AI job");
            return Ok(None);
        }

        if chat.status == ChatStatus::Open {
            self.store
                .compare_and_set_status(chat.id, ChatStatus::Open, ChatStatus::AiHandling)?;
        } else if chat.status != ChatStatus::AiHandling {
            debug!(
                chat_id = %chat.id,
                status = %chat.status,
                "Chat left the AI path; reply will still be appended"
            );
        }

        let mut history = self.store.messages(chat.id)?;
        if let Some(pos) = history.iter().rposition(|m| {
            m.message_type == MessageType::User && m.content == job.user_message
        }) {
            history.truncate(pos);
        }
        Ok(Some(history))
    }

    /// Store the AI reply and hand the chat back to `open` if no human
    /// action moved it meanwhile.
    pub fn complete_ai_response(
        &self,
        job: &AiJob,
        reply: &str,
    ) -> HelpdeskResult<Outcome<Option<Message>>> {
        let chat = self.load_chat(job.chat_id)?;
        if chat.status.is_terminal() {
            info!(chat_id = %chat.id, job_id = %job.id, status = %chat.status, "Discarding AI reply");
            return Ok(Outcome::new(None));
        }

        let message = self.store.append_message(NewMessage::ai(chat.id, reply))?;
        let reverted = self.store.compare_and_set_status(
            chat.id,
            ChatStatus::AiHandling,
            ChatStatus::Open,
        )?;
        debug!(chat_id = %chat.id, job_id = %job.id, reverted, "AI reply stored");

        let broadcast = Broadcast::message_sent(&message);
        Ok(Outcome::new(Some(message)).broadcast(broadcast))
    }

    /// Compensate for a failed AI job: reopen the chat and explain.
    pub fn fail_ai_response(&self, chat_id: ChatId) -> HelpdeskResult<Outcome<Option<Message>>> {
        let chat = self.load_chat(chat_id)?;
        if chat.status.is_terminal() {
            return Ok(Outcome::new(None));
        }

        self.store
            .compare_and_set_status(chat.id, ChatStatus::AiHandling, ChatStatus::Open)?;
        let notice = self.system_message(chat.id, AI_UNAVAILABLE_NOTICE)?;
        let broadcast = Broadcast::message_sent(&notice);
        Ok(Outcome::new(Some(notice)).broadcast(broadcast))
    }
}

/// Chat id for a first message; the store fills in the real one.
fn chat_placeholder() -> ChatId {
    ChatId(0)
}
