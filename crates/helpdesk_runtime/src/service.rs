//! `Helpdesk` facade: orchestrator operations with authorization and their
//! effects delivered.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use helpdesk_ai::{AiResponder, CompletionProvider, OfflineProvider, OpenAiProvider, Responder};
use helpdesk_core::{
    AccessPolicy, Chat, ChatDetail, ChatId, ChatStore, ChatSummary, Channel, HelpdeskResult,
    Identity, InMemoryChatStore, Message, Orchestrator, Outcome, RateLimiter,
};

use crate::broadcast::{Broadcaster, ChannelHub, Subscription};
use crate::config::HelpdeskConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{RuntimeError, RuntimeResult};
use crate::jobs::{handle_failure, job_channel, JobContext, WorkerPool};

/// Builder for [`Helpdesk`].
pub struct HelpdeskBuilder {
    config: HelpdeskConfig,
    store: Option<Arc<dyn ChatStore>>,
    responder: Option<Arc<dyn Responder>>,
    hub: Option<Arc<ChannelHub>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
}

impl HelpdeskBuilder {
    pub fn new(config: HelpdeskConfig) -> Self {
        Self {
            config,
            store: None,
            responder: None,
            hub: None,
            broadcaster: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn hub(mut self, hub: Arc<ChannelHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Publish through `broadcaster` instead of the built-in hub.
    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Wire everything up and start the AI workers. Must be called inside
    /// a tokio runtime.
    pub fn build(self) -> RuntimeResult<Helpdesk> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryChatStore::new()));
        let limiter = Arc::new(RateLimiter::new(self.config.rate_limit));
        let orchestrator = Arc::new(Orchestrator::new(store, limiter));

        let responder = match self.responder {
            Some(responder) => responder,
            None => default_responder(&self.config)?,
        };

        let hub = self.hub.unwrap_or_default();
        let broadcaster = self
            .broadcaster
            .unwrap_or_else(|| hub.clone() as Arc<dyn Broadcaster>);

        let (queue, receiver) = job_channel();
        let dispatcher = Arc::new(Dispatcher::new(broadcaster, queue.clone()));
        let context = JobContext {
            orchestrator: orchestrator.clone(),
            responder,
            dispatcher: dispatcher.clone(),
        };
        let pool = WorkerPool::spawn(context.clone(), queue, receiver, self.config.jobs.workers);

        Ok(Helpdesk {
            orchestrator,
            dispatcher,
            hub,
            context,
            pool: Mutex::new(Some(pool)),
            config: self.config,
        })
    }
}

fn default_responder(config: &HelpdeskConfig) -> RuntimeResult<Arc<dyn Responder>> {
    let provider: Arc<dyn CompletionProvider> = match config.ai.api_key.as_deref() {
        Some(key) if config.ai.has_api_key() => Arc::new(
            OpenAiProvider::new(key, &config.ai).map_err(|e| RuntimeError::Config(e.to_string()))?,
        ),
        _ => {
            info!("No OpenAI API key configured; AI replies will use the fallback text");
            Arc::new(OfflineProvider)
        }
    };
    Ok(Arc::new(AiResponder::new(provider, config.ai.clone())))
}

/// The helpdesk service.
pub struct Helpdesk {
    orchestrator: Arc<Orchestrator>,
    dispatcher: Arc<Dispatcher>,
    hub: Arc<ChannelHub>,
    context: JobContext,
    pool: Mutex<Option<WorkerPool>>,
    config: HelpdeskConfig,
}

impl Helpdesk {
    pub fn builder(config: HelpdeskConfig) -> HelpdeskBuilder {
        HelpdeskBuilder::new(config)
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &HelpdeskConfig {
        &self.config
    }

    fn policy(&self) -> &AccessPolicy {
        self.orchestrator.policy()
    }

    /// Deliver effects; jobs the queue refuses are failed right away so the
    /// chat does not wait forever for a reply.
    fn apply<T>(&self, outcome: Outcome<T>) -> T {
        let (value, outbound) = outcome.into_parts();
        let report = self.dispatcher.dispatch(outbound);
        for job in &report.rejected_jobs {
            handle_failure(&self.context, job);
        }
        value
    }

    pub fn create_chat(&self, user: &Identity, message: &str) -> HelpdeskResult<ChatDetail> {
        let outcome = self.orchestrator.create_chat(user, message)?;
        Ok(self.apply(outcome))
    }

    pub fn send_message(&self, chat_id: ChatId, author: &Identity, content: &str) -> HelpdeskResult<Message> {
        let chat = self.orchestrator.chat(chat_id)?;
        self.policy().authorize_update(author, &chat)?;
        let outcome = self.orchestrator.send_message(chat_id, author, content)?;
        Ok(self.apply(outcome))
    }

    pub fn agent_reply(&self, chat_id: ChatId, agent: &Identity, content: &str) -> HelpdeskResult<Message> {
        let chat = self.orchestrator.chat(chat_id)?;
        self.policy().authorize_update(agent, &chat)?;
        let outcome = self.orchestrator.agent_reply(chat_id, agent, content)?;
        Ok(self.apply(outcome))
    }

    pub fn assign_to_agent(&self, chat_id: ChatId, agent: &Identity) -> HelpdeskResult<Chat> {
        let chat = self.orchestrator.chat(chat_id)?;
        self.policy().authorize_assign(agent, &chat)?;
        let outcome = self.orchestrator.assign_to_agent(chat_id, agent)?;
        Ok(self.apply(outcome))
    }

    pub fn resolve_chat(&self, chat_id: ChatId, resolver: &Identity) -> HelpdeskResult<Chat> {
        let chat = self.orchestrator.chat(chat_id)?;
        self.policy().authorize_update(resolver, &chat)?;
        let outcome = self.orchestrator.resolve_chat(chat_id, resolver)?;
        Ok(self.apply(outcome))
    }

    pub fn close_chat(&self, chat_id: ChatId, admin: &Identity) -> HelpdeskResult<Chat> {
        let chat = self.orchestrator.chat(chat_id)?;
        self.policy().authorize_close(admin, &chat)?;
        let outcome = self.orchestrator.close_chat(chat_id, admin)?;
        Ok(self.apply(outcome))
    }

    pub fn chat_detail(&self, chat_id: ChatId, viewer: &Identity) -> HelpdeskResult<ChatDetail> {
        let detail = self.orchestrator.chat_detail(chat_id)?;
        self.policy().authorize_view(viewer, &detail.chat)?;
        Ok(detail)
    }

    pub fn messages(&self, chat_id: ChatId, viewer: &Identity) -> HelpdeskResult<Vec<Message>> {
        self.chat_detail(chat_id, viewer).map(|detail| detail.messages)
    }

    pub fn user_chats(&self, user: &Identity) -> HelpdeskResult<Vec<ChatSummary>> {
        self.orchestrator.user_chats(user)
    }

    pub fn agent_chats(&self, agent: &Identity) -> HelpdeskResult<Vec<ChatSummary>> {
        self.policy().require_agent(agent)?;
        self.orchestrator.agent_chats(agent)
    }

    pub fn unassigned_chats(&self, agent: &Identity) -> HelpdeskResult<Vec<ChatSummary>> {
        self.policy().require_agent(agent)?;
        self.orchestrator.unassigned_chats()
    }

    /// Subscribe to a channel on the built-in hub. Chat channels follow the
    /// view rule; the agent pool channel is for agents and admins.
    pub fn subscribe(&self, channel: Channel, identity: &Identity) -> HelpdeskResult<Subscription> {
        match channel {
            Channel::Chat(chat_id) => {
                let chat = self.orchestrator.chat(chat_id)?;
                self.policy().authorize_view(identity, &chat)?;
            }
            Channel::HelpdeskAgents => self.policy().require_agent(identity)?,
        }
        Ok(self.hub.subscribe(channel, Some(identity.id)))
    }

    /// Let queued AI jobs finish, then stop the workers.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        let pool = self.pool.lock().take();
        match pool {
            Some(pool) => pool.shutdown().await,
            None => Ok(()),
        }
    }
}

impl Drop for Helpdesk {
    fn drop(&mut self) {
        if self.pool.get_mut().is_some() {
            warn!("Helpdesk dropped without shutdown; queued AI jobs may be lost");
        }
    }
}
