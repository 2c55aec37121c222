//! AI job queue and worker pool.
//!
//! Jobs travel over an unbounded mpsc queue to a fixed set of tokio workers.
//! Each job runs in its own task so a panic is caught as a `JoinError` and
//! routed to the failure handler like any other job error.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use helpdesk_ai::Responder;
use helpdesk_core::{AiJob, Orchestrator};

use crate::dispatcher::Dispatcher;
use crate::error::{RuntimeError, RuntimeResult};

enum Command {
    Run(AiJob),
    Stop,
}

/// Sending half of the AI job queue.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Command>,
}

impl JobQueue {
    pub fn enqueue(&self, job: AiJob) -> RuntimeResult<()> {
        debug!(chat_id = %job.chat_id, job_id = %job.id, "AI job queued");
        self.sender
            .send(Command::Run(job))
            .map_err(|_| RuntimeError::QueueClosed)
    }

    fn stop(&self) -> RuntimeResult<()> {
        self.sender
            .send(Command::Stop)
            .map_err(|_| RuntimeError::QueueClosed)
    }
}

/// Receiving half of the AI job queue.
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl JobReceiver {
    /// Pop a queued job without waiting.
    pub fn try_next_job(&mut self) -> Option<AiJob> {
        loop {
            match self.receiver.try_recv().ok()? {
                Command::Run(job) => return Some(job),
                Command::Stop => continue,
            }
        }
    }
}

pub fn job_channel() -> (JobQueue, JobReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (JobQueue { sender }, JobReceiver { receiver })
}

/// Everything a worker needs to run a job.
#[derive(Clone)]
pub struct JobContext {
    pub orchestrator: Arc<Orchestrator>,
    pub responder: Arc<dyn Responder>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Fixed-size pool of AI job workers.
pub struct WorkerPool {
    queue: JobQueue,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` workers reading from `receiver`. Must be called
    /// inside a tokio runtime.
    pub fn spawn(context: JobContext, queue: JobQueue, receiver: JobReceiver, workers: usize) -> Self {
        let context = Arc::new(context);
        let receiver = Arc::new(Mutex::new(receiver.receiver));
        let handles = (0..workers.max(1))
            .map(|worker| {
                let context = context.clone();
                let receiver = receiver.clone();
                tokio::spawn(worker_loop(worker, context, receiver))
            })
            .collect::<Vec<_>>();
        info!(workers = handles.len(), "AI worker pool started");
        Self { queue, handles }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Finish every job queued so far, then stop the workers.
    pub async fn shutdown(self) -> RuntimeResult<()> {
        for _ in &self.handles {
            self.queue.stop()?;
        }
        for handle in self.handles {
            handle
                .await
                .map_err(|e| RuntimeError::Job(format!("worker terminated abnormally: {e}")))?;
        }
        info!("AI worker pool stopped");
        Ok(())
    }
}

async fn worker_loop(
    worker: usize,
    context: Arc<JobContext>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Command>>>,
) {
    loop {
        let command = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        match command {
            Some(Command::Run(job)) => {
                debug!(worker, chat_id = %job.chat_id, job_id = %job.id, "AI job started");
                run_job(&context, job).await;
            }
            Some(Command::Stop) | None => break,
        }
    }
    debug!(worker, "AI worker exiting");
}

/// Run one job to completion, compensating on failure.
pub async fn run_job(context: &Arc<JobContext>, job: AiJob) {
    let task = tokio::spawn(process_job(context.clone(), job.clone()));
    let failure = match task.await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(join) if join.is_panic() => "job task panicked".to_string(),
        Err(join) => join.to_string(),
    };

    error!(chat_id = %job.chat_id, job_id = %job.id, error = %failure, "AI job failed");
    handle_failure(context, &job);
}

async fn process_job(context: Arc<JobContext>, job: AiJob) -> RuntimeResult<()> {
    let Some(history) = context.orchestrator.begin_ai_response(&job)? else {
        return Ok(());
    };

    let reply = context
        .responder
        .generate_response(&job.user_message, &history)
        .await;

    let outcome = context.orchestrator.complete_ai_response(&job, &reply)?;
    context.dispatcher.dispatch(outcome.outbound);
    debug!(chat_id = %job.chat_id, job_id = %job.id, "AI job completed");
    Ok(())
}

/// Reopen the chat and post the apology. No retry of the job.
pub fn handle_failure(context: &JobContext, job: &AiJob) {
    match context.orchestrator.fail_ai_response(job.chat_id) {
        Ok(outcome) => {
            context.dispatcher.dispatch(outcome.outbound);
        }
        Err(err) => {
            error!(
                chat_id = %job.chat_id,
                job_id = %job.id,
                error = %err,
                "Could not record AI job failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use async_trait::async_trait;
    use helpdesk_core::{
        ChatStatus, Identity, InMemoryChatStore, Message, MessageType, RateLimitConfig,
        RateLimiter, AI_UNAVAILABLE_NOTICE,
    };

    struct Echo;

    #[async_trait]
    impl Responder for Echo {
        async fn generate_response(&self, user_message: &str, _history: &[Message]) -> String {
            format!("echo: {user_message}")
        }
    }

    struct Exploding;

    #[async_trait]
    impl Responder for Exploding {
        async fn generate_response(&self, _user_message: &str, _history: &[Message]) -> String {
            panic!("responder blew up");
        }
    }

    fn context(responder: Arc<dyn Responder>) -> (Arc<JobContext>, RecordingBroadcaster) {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(InMemoryChatStore::new()),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
        ));
        let recorder = RecordingBroadcaster::new();
        let (queue, _receiver) = job_channel();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(recorder.clone()), queue));
        let context = Arc::new(JobContext {
            orchestrator,
            responder,
            dispatcher,
        });
        (context, recorder)
    }

    #[tokio::test]
    async fn test_job_appends_ai_reply() {
        let (ctx, recorder) = context(Arc::new(Echo));
        let outcome = ctx
            .orchestrator
            .create_chat(&Identity::user(1, "Ann"), "hello")
            .unwrap();
        let job = outcome.ai_jobs().next().unwrap().clone();

        run_job(&ctx, job.clone()).await;

        let messages = ctx.orchestrator.messages(job.chat_id).unwrap();
        let reply = messages.last().unwrap();
        assert_eq!(reply.message_type, MessageType::Ai);
        assert_eq!(reply.content, "echo: hello");
        assert_eq!(ctx.orchestrator.chat(job.chat_id).unwrap().status, ChatStatus::Open);
        assert_eq!(recorder.published().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_compensated() {
        let (ctx, recorder) = context(Arc::new(Exploding));
        let outcome = ctx
            .orchestrator
            .create_chat(&Identity::user(1, "Ann"), "hello")
            .unwrap();
        let job = outcome.ai_jobs().next().unwrap().clone();

        run_job(&ctx, job.clone()).await;

        let last = ctx.orchestrator.messages(job.chat_id).unwrap().pop().unwrap();
        assert_eq!(last.message_type, MessageType::System);
        assert_eq!(last.content, AI_UNAVAILABLE_NOTICE);
        assert_eq!(ctx.orchestrator.chat(job.chat_id).unwrap().status, ChatStatus::Open);
        assert_eq!(recorder.published().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_chat_fails_quietly() {
        let (ctx, recorder) = context(Arc::new(Echo));
        run_job(&ctx, AiJob::new(helpdesk_core::ChatId(404), "hello")).await;
        assert!(recorder.published().is_empty());
    }

    #[tokio::test]
    async fn test_pool_drains_on_shutdown() {
        let (ctx, recorder) = context(Arc::new(Echo));
        let (queue, receiver) = job_channel();
        let orchestrator = ctx.orchestrator.clone();
        let pool_context = JobContext {
            orchestrator: orchestrator.clone(),
            responder: Arc::new(Echo),
            dispatcher: ctx.dispatcher.clone(),
        };
        let pool = WorkerPool::spawn(pool_context, queue.clone(), receiver, 2);
        assert_eq!(pool.worker_count(), 2);

        let mut chats = Vec::new();
        for i in 0..4 {
            let outcome = orchestrator
                .create_chat(&Identity::user(i, "User"), "hello")
                .unwrap();
            chats.push(outcome.value.chat.id);
            for job in outcome.ai_jobs() {
                queue.enqueue(job.clone()).unwrap();
            }
        }
        pool.shutdown().await.unwrap();

        for chat_id in chats {
            let messages = orchestrator.messages(chat_id).unwrap();
            assert_eq!(messages.len(), 2);
        }
        assert_eq!(recorder.published().len(), 4);
        assert!(queue.enqueue(AiJob::new(helpdesk_core::ChatId(1), "late")).is_err());
    }
}
