//! End-to-end chat lifecycle scenarios against the in-memory store.

use std::sync::Arc;

use chrono::Duration;

use helpdesk_core::{
    should_transfer_to_human, BroadcastEvent, Channel, ChatStatus, ChatStore, HelpdeskError,
    Identity, InMemoryChatStore, ManualClock, MessageType, Orchestrator, RateLimitConfig,
    RateLimiter, TRANSFER_NOTICE,
};

struct Fixture {
    orch: Orchestrator,
    store: InMemoryChatStore,
    clock: ManualClock,
}

fn fixture() -> Fixture {
    let clock = ManualClock::default();
    let store = InMemoryChatStore::with_clock(Arc::new(clock.clone()));
    let limiter = RateLimiter::with_clock(RateLimitConfig::default(), Arc::new(clock.clone()));
    let orch = Orchestrator::with_clock(
        Arc::new(store.clone()),
        Arc::new(limiter),
        Arc::new(clock.clone()),
    );
    Fixture { orch, store, clock }
}

fn customer() -> Identity {
    Identity::user(1, "Ann")
}

fn agent() -> Identity {
    Identity::agent(10, "Ada")
}

/// A new chat starts open with one user message and one AI job.
#[test]
fn test_create_chat_schedules_ai() {
    let f = fixture();
    let outcome = f.orch.create_chat(&customer(), "I need help").unwrap();

    assert_eq!(outcome.value.chat.status, ChatStatus::Open);
    let messages = f.orch.messages(outcome.value.chat.id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_type, MessageType::User);
    assert_eq!(messages[0].user_id, Some(customer().id));
    assert_eq!(outcome.ai_jobs().count(), 1);
}

/// Asking for a human hands the chat to the agent pool instead of the AI.
#[test]
fn test_transfer_request_reaches_agent_pool() {
    let f = fixture();
    let chat = f.orch.create_chat(&customer(), "I need help").unwrap().value.chat;

    let outcome = f
        .orch
        .send_message(chat.id, &customer(), "let me talk to a human")
        .unwrap();

    assert!(outcome.value.is_transfer_request);
    assert_eq!(outcome.ai_jobs().count(), 0);
    assert_eq!(f.orch.chat(chat.id).unwrap().status, ChatStatus::Transferred);

    let alert = outcome
        .broadcasts()
        .find(|b| b.channel == Channel::HelpdeskAgents)
        .expect("agent pool alert");
    match &alert.event {
        BroadcastEvent::TransferRequested { chat: payload } => {
            assert_eq!(payload.id, chat.id);
            assert_eq!(payload.status, ChatStatus::Transferred);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let transcript = f.orch.messages(chat.id).unwrap();
    let last = transcript.last().unwrap();
    assert_eq!(last.message_type, MessageType::System);
    assert_eq!(last.content, TRANSFER_NOTICE);

    let queue = f.orch.unassigned_chats().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].chat.id, chat.id);
}

/// The eleventh message inside one window is refused and nothing is stored.
#[test]
fn test_rate_limit_on_eleventh_message() {
    let f = fixture();
    let chat = f.orch.create_chat(&customer(), "I need help").unwrap().value.chat;

    for i in 0..10 {
        f.orch
            .send_message(chat.id, &customer(), &format!("message {i}"))
            .unwrap();
        f.clock.advance(Duration::seconds(1));
    }
    let before = f.orch.messages(chat.id).unwrap().len();

    let err = f
        .orch
        .send_message(chat.id, &customer(), "one too many")
        .unwrap_err();
    let retry = err.retry_after().expect("retry hint");
    assert!(retry >= 1 && retry <= 60);
    assert_eq!(err.status_code(), 422);
    assert_eq!(f.orch.messages(chat.id).unwrap().len(), before);

    // agents are never limited
    f.orch.agent_reply(chat.id, &agent(), "I'm here").unwrap();

    f.clock.advance(Duration::seconds(60));
    f.orch
        .send_message(chat.id, &customer(), "back again")
        .unwrap();
}

/// Claiming a transferred chat puts the agent in charge.
#[test]
fn test_agent_claims_transferred_chat() {
    let f = fixture();
    let chat = f.orch.create_chat(&customer(), "I need help").unwrap().value.chat;
    f.orch
        .send_message(chat.id, &customer(), "escalate this")
        .unwrap();

    let outcome = f.orch.assign_to_agent(chat.id, &agent()).unwrap();
    assert_eq!(outcome.value.status, ChatStatus::AgentHandling);
    assert_eq!(outcome.value.assigned_agent_id, Some(agent().id));

    let last = f.store.latest_message(chat.id).unwrap().unwrap();
    assert_eq!(last.content, "Agent Ada has joined the chat");

    assert!(f.orch.unassigned_chats().unwrap().is_empty());
    let mine = f.orch.agent_chats(&agent()).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].latest_message.as_ref().unwrap().id, last.id);

    // the customer keeps talking to the agent, not the AI
    let reply = f
        .orch
        .send_message(chat.id, &customer(), "thanks")
        .unwrap();
    assert_eq!(reply.ai_jobs().count(), 0);
}

/// A failed AI job reopens the chat and explains itself in the transcript.
#[test]
fn test_failed_ai_job_is_compensated() {
    let f = fixture();
    let outcome = f.orch.create_chat(&customer(), "I need help").unwrap();
    let job = outcome.ai_jobs().next().unwrap().clone();

    f.orch.begin_ai_response(&job).unwrap();
    assert_eq!(f.orch.chat(job.chat_id).unwrap().status, ChatStatus::AiHandling);

    let failed = f.orch.fail_ai_response(job.chat_id).unwrap();
    assert_eq!(failed.broadcasts().count(), 1);
    assert_eq!(f.orch.chat(job.chat_id).unwrap().status, ChatStatus::Open);

    let last = f.store.latest_message(job.chat_id).unwrap().unwrap();
    assert_eq!(last.message_type, MessageType::System);
    assert!(last.content.starts_with("AI service is temporarily unavailable"));
}

/// Resolution is final.
#[test]
fn test_resolved_chat_is_read_only() {
    let f = fixture();
    let chat = f.orch.create_chat(&customer(), "I need help").unwrap().value.chat;
    f.orch.assign_to_agent(chat.id, &agent()).unwrap();

    let resolved = f.orch.resolve_chat(chat.id, &agent()).unwrap().value;
    assert_eq!(resolved.status, ChatStatus::Resolved);
    assert!(resolved.resolved_at.is_some());

    let err = f
        .orch
        .send_message(chat.id, &customer(), "wait, one more thing")
        .unwrap_err();
    assert_eq!(err, HelpdeskError::ChatResolved);
    assert_eq!(err.status_code(), 422);

    let err = f.orch.agent_reply(chat.id, &agent(), "bye").unwrap_err();
    assert_eq!(err, HelpdeskError::ChatResolved);

    let last = f.store.latest_message(chat.id).unwrap().unwrap();
    assert_eq!(last.content, "Chat resolved by Ada");
    assert!(f.orch.agent_chats(&agent()).unwrap().is_empty());
}

#[test]
fn test_transcript_order_survives_clock_skew() {
    let f = fixture();
    let chat = f.orch.create_chat(&customer(), "first").unwrap().value.chat;
    f.clock.advance(Duration::seconds(-30));
    f.orch.send_message(chat.id, &customer(), "second").unwrap();
    f.clock.advance(Duration::seconds(5));
    f.orch.send_message(chat.id, &customer(), "third").unwrap();

    let transcript = f.orch.chat_detail(chat.id).unwrap().messages;
    let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert!(transcript
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));
}

#[test]
fn test_script_tags_are_neutralised() {
    let f = fixture();
    let detail = f
        .orch
        .create_chat(&customer(), "<script>alert(1)</script>Hello")
        .unwrap()
        .value;
    let stored = &detail.messages[0].content;
    assert!(stored.contains("Hello"));
    assert!(!stored.contains("<script>"));
}

#[test]
fn test_detection_is_stable() {
    for text in ["Get me a MANAGER", "thanks, that worked", "  Speak to someone  "] {
        assert_eq!(should_transfer_to_human(text), should_transfer_to_human(text));
    }
}

#[test]
fn test_user_cannot_see_other_users_chat() {
    let f = fixture();
    let chat = f.orch.create_chat(&customer(), "I need help").unwrap().value.chat;
    let stranger = Identity::user(2, "Ben");
    assert!(f.orch.policy().authorize_view(&stranger, &chat).is_err());
    assert!(f.orch.policy().authorize_view(&agent(), &chat).is_ok());
    assert!(f.orch.user_chats(&stranger).unwrap().is_empty());
}
