//! Chat persistence layer.
//!
//! [`ChatStore`] owns chat and message rows and every transactional
//! boundary. [`InMemoryChatStore`] keeps all rows behind one lock, so each
//! trait method is a single atomic unit.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{HelpdeskError, HelpdeskResult};
use crate::clock::{Clock, SystemClock};
use crate::types::{
    Chat, ChatDetail, ChatId, ChatStatus, ChatSummary, Message, MessageId, NewChat, NewMessage,
    UserId,
};

/// Statuses an agent sees in their own queue.
pub const AGENT_QUEUE_STATUSES: [ChatStatus; 2] =
    [ChatStatus::AgentHandling, ChatStatus::Transferred];

/// Statuses eligible for pickup by the agent pool.
pub const UNASSIGNED_QUEUE_STATUSES: [ChatStatus; 2] = [ChatStatus::Transferred, ChatStatus::Open];

/// Storage contract for chats and messages.
pub trait ChatStore: Send + Sync {
    /// Insert a chat together with its first message, or neither.
    /// `first_message.chat_id` is replaced with the id of the new chat.
    fn create_chat(&self, chat: NewChat, first_message: NewMessage) -> HelpdeskResult<(Chat, Message)>;

    /// Append a message. The chat must exist.
    fn append_message(&self, message: NewMessage) -> HelpdeskResult<Message>;

    fn find_chat(&self, chat_id: ChatId) -> HelpdeskResult<Option<Chat>>;

    /// Chat with its ordered transcript.
    fn chat_detail(&self, chat_id: ChatId) -> HelpdeskResult<Option<ChatDetail>>;

    /// All messages of a chat ordered by creation time.
    fn messages(&self, chat_id: ChatId) -> HelpdeskResult<Vec<Message>>;

    fn latest_message(&self, chat_id: ChatId) -> HelpdeskResult<Option<Message>>;

    /// Unconditionally set the status.
    fn update_status(&self, chat_id: ChatId, status: ChatStatus) -> HelpdeskResult<Chat>;

    /// Set `next` only if the current status equals `expected`.
    /// Returns whether the swap happened.
    fn compare_and_set_status(
        &self,
        chat_id: ChatId,
        expected: ChatStatus,
        next: ChatStatus,
    ) -> HelpdeskResult<bool>;

    /// Set the assigned agent and move to `agent_handling` in one update.
    fn assign_agent(&self, chat_id: ChatId, agent_id: UserId) -> HelpdeskResult<Chat>;

    /// Move to `resolved` and stamp `resolved_at` in one update.
    fn resolve(&self, chat_id: ChatId, resolved_at: DateTime<Utc>) -> HelpdeskResult<Chat>;

    /// Chats owned by a user, newest first.
    fn chats_for_user(&self, user_id: UserId) -> HelpdeskResult<Vec<ChatSummary>>;

    /// Chats assigned to an agent in an active agent status, most recently
    /// updated first.
    fn chats_for_agent(&self, agent_id: UserId) -> HelpdeskResult<Vec<ChatSummary>>;

    /// Unassigned chats waiting for pickup, oldest first.
    fn unassigned_chats(&self) -> HelpdeskResult<Vec<ChatSummary>>;
}

#[derive(Default)]
struct Tables {
    chats: BTreeMap<ChatId, Chat>,
    messages: BTreeMap<ChatId, Vec<Message>>,
    next_chat_id: u64,
    next_message_id: u64,
}

impl Tables {
    fn chat_mut(&mut self, chat_id: ChatId) -> HelpdeskResult<&mut Chat> {
        self.chats
            .get_mut(&chat_id)
            .ok_or(HelpdeskError::ChatNotFound(chat_id))
    }

    fn insert_message(&mut self, new: NewMessage, now: DateTime<Utc>) -> Message {
        self.next_message_id += 1;
        let transcript = self.messages.entry(new.chat_id).or_default();
        // Keep created_at non-decreasing even if the clock steps back.
        let created_at = transcript
            .last()
            .map(|last| last.created_at.max(now))
            .unwrap_or(now);
        let message = Message {
            id: MessageId(self.next_message_id),
            chat_id: new.chat_id,
            user_id: new.user_id,
            message_type: new.message_type,
            content: new.content,
            is_transfer_request: new.is_transfer_request,
            created_at,
        };
        transcript.push(message.clone());
        message
    }

    fn summary(&self, chat: &Chat) -> ChatSummary {
        ChatSummary {
            chat: chat.clone(),
            latest_message: self
                .messages
                .get(&chat.id)
                .and_then(|messages| messages.last().cloned()),
        }
    }
}

/// In-process store with transactional semantics.
#[derive(Clone)]
pub struct InMemoryChatStore {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            clock,
        }
    }

    /// Number of stored chats.
    pub fn chat_count(&self) -> usize {
        self.tables.read().chats.len()
    }
}

impl ChatStore for InMemoryChatStore {
    fn create_chat(&self, chat: NewChat, first_message: NewMessage) -> HelpdeskResult<(Chat, Message)> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        tables.next_chat_id += 1;
        let chat_id = ChatId(tables.next_chat_id);
        let chat = Chat {
            id: chat_id,
            user_id: chat.user_id,
            assigned_agent_id: None,
            status: chat.status,
            subject: chat.subject,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.chats.insert(chat_id, chat.clone());
        let message = tables.insert_message(
            NewMessage {
                chat_id,
                ..first_message
            },
            now,
        );
        Ok((chat, message))
    }

    fn append_message(&self, message: NewMessage) -> HelpdeskResult<Message> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        tables.chat_mut(message.chat_id)?;
        Ok(tables.insert_message(message, now))
    }

    fn find_chat(&self, chat_id: ChatId) -> HelpdeskResult<Option<Chat>> {
        Ok(self.tables.read().chats.get(&chat_id).cloned())
    }

    fn chat_detail(&self, chat_id: ChatId) -> HelpdeskResult<Option<ChatDetail>> {
        let tables = self.tables.read();
        Ok(tables.chats.get(&chat_id).map(|chat| ChatDetail {
            chat: chat.clone(),
            messages: tables.messages.get(&chat_id).cloned().unwrap_or_default(),
        }))
    }

    fn messages(&self, chat_id: ChatId) -> HelpdeskResult<Vec<Message>> {
        let tables = self.tables.read();
        if !tables.chats.contains_key(&chat_id) {
            return Err(HelpdeskError::ChatNotFound(chat_id));
        }
        Ok(tables.messages.get(&chat_id).cloned().unwrap_or_default())
    }

    fn latest_message(&self, chat_id: ChatId) -> HelpdeskResult<Option<Message>> {
        Ok(self
            .tables
            .read()
            .messages
            .get(&chat_id)
            .and_then(|messages| messages.last().cloned()))
    }

    fn update_status(&self, chat_id: ChatId, status: ChatStatus) -> HelpdeskResult<Chat> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let chat = tables.chat_mut(chat_id)?;
        chat.status = status;
        chat.updated_at = now;
        Ok(chat.clone())
    }

    fn compare_and_set_status(
        &self,
        chat_id: ChatId,
        expected: ChatStatus,
        next: ChatStatus,
    ) -> HelpdeskResult<bool> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let chat = tables.chat_mut(chat_id)?;
        if chat.status != expected {
            return Ok(false);
        }
        chat.status = next;
        chat.updated_at = now;
        Ok(true)
    }

    fn assign_agent(&self, chat_id: ChatId, agent_id: UserId) -> HelpdeskResult<Chat> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let chat = tables.chat_mut(chat_id)?;
        chat.assigned_agent_id = Some(agent_id);
        chat.status = ChatStatus::AgentHandling;
        chat.updated_at = now;
        Ok(chat.clone())
    }

    fn resolve(&self, chat_id: ChatId, resolved_at: DateTime<Utc>) -> HelpdeskResult<Chat> {
        let mut tables = self.tables.write();
        let chat = tables.chat_mut(chat_id)?;
        chat.status = ChatStatus::Resolved;
        chat.resolved_at = Some(resolved_at);
        chat.updated_at = resolved_at;
        Ok(chat.clone())
    }

    fn chats_for_user(&self, user_id: UserId) -> HelpdeskResult<Vec<ChatSummary>> {
        let tables = self.tables.read();
        let mut chats: Vec<&Chat> = tables
            .chats
            .values()
            .filter(|chat| chat.user_id == user_id)
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(chats.into_iter().map(|chat| tables.summary(chat)).collect())
    }

    fn chats_for_agent(&self, agent_id: UserId) -> HelpdeskResult<Vec<ChatSummary>> {
        let tables = self.tables.read();
        let mut chats: Vec<&Chat> = tables
            .chats
            .values()
            .filter(|chat| {
                chat.assigned_agent_id == Some(agent_id)
                    && AGENT_QUEUE_STATUSES.contains(&chat.status)
            })
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(chats.into_iter().map(|chat| tables.summary(chat)).collect())
    }

    fn unassigned_chats(&self) -> HelpdeskResult<Vec<ChatSummary>> {
        let tables = self.tables.read();
        let mut chats: Vec<&Chat> = tables
            .chats
            .values()
            .filter(|chat| {
                chat.assigned_agent_id.is_none()
                    && UNASSIGNED_QUEUE_STATUSES.contains(&chat.status)
            })
            .collect();
        chats.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(chats.into_iter().map(|chat| tables.summary(chat)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::MessageType;
    use chrono::Duration;

    fn store() -> (InMemoryChatStore, ManualClock) {
        let clock = ManualClock::default();
        (InMemoryChatStore::with_clock(Arc::new(clock.clone())), clock)
    }

    fn open_chat(store: &InMemoryChatStore, owner: u64, text: &str) -> Chat {
        let (chat, _) = store
            .create_chat(
                NewChat {
                    user_id: UserId(owner),
                    status: ChatStatus::Open,
                    subject: text.to_string(),
                },
                NewMessage::authored(ChatId(0), UserId(owner), MessageType::User, text),
            )
            .unwrap();
        chat
    }

    #[test]
    fn test_create_chat_persists_first_message() {
        let (store, _) = store();
        let chat = open_chat(&store, 1, "I need help");
        let detail = store.chat_detail(chat.id).unwrap().unwrap();
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.messages[0].chat_id, chat.id);
        assert_eq!(detail.messages[0].content, "I need help");
        assert_eq!(detail.chat.status, ChatStatus::Open);
    }

    #[test]
    fn test_chat_ids_are_sequential() {
        let (store, _) = store();
        let a = open_chat(&store, 1, "a");
        let b = open_chat(&store, 1, "b");
        assert_eq!(a.id, ChatId(1));
        assert_eq!(b.id, ChatId(2));
        assert_eq!(store.chat_count(), 2);
        assert_eq!(store.latest_message(b.id).unwrap().unwrap().chat_id, b.id);
    }

    #[test]
    fn test_append_to_missing_chat_fails() {
        let (store, _) = store();
        let err = store
            .append_message(NewMessage::system(ChatId(42), "hello"))
            .unwrap_err();
        assert_eq!(err, HelpdeskError::ChatNotFound(ChatId(42)));
    }

    #[test]
    fn test_messages_stay_ordered() {
        let (store, clock) = store();
        let chat = open_chat(&store, 1, "first");
        clock.advance(Duration::seconds(5));
        store.append_message(NewMessage::ai(chat.id, "second")).unwrap();
        // Clock stepping back must not reorder the transcript.
        clock.advance(Duration::seconds(-30));
        store.append_message(NewMessage::system(chat.id, "third")).unwrap();

        let messages = store.messages(chat.id).unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert!(messages
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[test]
    fn test_compare_and_set_status() {
        let (store, _) = store();
        let chat = open_chat(&store, 1, "hi");
        assert!(store
            .compare_and_set_status(chat.id, ChatStatus::Open, ChatStatus::AiHandling)
            .unwrap());
        assert!(!store
            .compare_and_set_status(chat.id, ChatStatus::Open, ChatStatus::Transferred)
            .unwrap());
        let chat = store.find_chat(chat.id).unwrap().unwrap();
        assert_eq!(chat.status, ChatStatus::AiHandling);
    }

    #[test]
    fn test_assign_and_resolve() {
        let (store, clock) = store();
        let chat = open_chat(&store, 1, "hi");
        let assigned = store.assign_agent(chat.id, UserId(50)).unwrap();
        assert_eq!(assigned.status, ChatStatus::AgentHandling);
        assert_eq!(assigned.assigned_agent_id, Some(UserId(50)));

        let now = clock.now();
        let resolved = store.resolve(chat.id, now).unwrap();
        assert_eq!(resolved.status, ChatStatus::Resolved);
        assert_eq!(resolved.resolved_at, Some(now));
    }

    #[test]
    fn test_queues() {
        let (store, clock) = store();
        let first = open_chat(&store, 1, "first");
        clock.advance(Duration::seconds(1));
        let second = open_chat(&store, 2, "second");
        clock.advance(Duration::seconds(1));
        let third = open_chat(&store, 1, "third");
        clock.advance(Duration::seconds(1));

        store
            .update_status(second.id, ChatStatus::Transferred)
            .unwrap();
        store.assign_agent(third.id, UserId(50)).unwrap();

        let unassigned: Vec<_> = store
            .unassigned_chats()
            .unwrap()
            .into_iter()
            .map(|s| s.chat.id)
            .collect();
        assert_eq!(unassigned, [first.id, second.id]);

        let mine: Vec<_> = store
            .chats_for_user(UserId(1))
            .unwrap()
            .into_iter()
            .map(|s| s.chat.id)
            .collect();
        assert_eq!(mine, [third.id, first.id]);

        let agent = store.chats_for_agent(UserId(50)).unwrap();
        assert_eq!(agent.len(), 1);
        assert_eq!(agent[0].chat.id, third.id);
        assert_eq!(agent[0].latest_message.as_ref().unwrap().content, "third");

        store.resolve(third.id, clock.now()).unwrap();
        assert!(store.chats_for_agent(UserId(50)).unwrap().is_empty());
    }
}
