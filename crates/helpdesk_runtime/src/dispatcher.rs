//! Delivers the outbound effects returned by orchestrator operations.

use std::sync::Arc;

use tracing::{debug, error};

use helpdesk_core::{AiJob, Outbound};

use crate::broadcast::Broadcaster;
use crate::jobs::JobQueue;

/// What a dispatch actually delivered.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Broadcasts handed to the broadcaster
    pub published: usize,
    /// Jobs the queue refused because it is closed
    pub rejected_jobs: Vec<AiJob>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.rejected_jobs.is_empty()
    }
}

/// Routes broadcasts to the [`Broadcaster`] and AI jobs to the [`JobQueue`].
pub struct Dispatcher {
    broadcaster: Arc<dyn Broadcaster>,
    queue: JobQueue,
}

impl Dispatcher {
    pub fn new(broadcaster: Arc<dyn Broadcaster>, queue: JobQueue) -> Self {
        Self { broadcaster, queue }
    }

    pub fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }

    /// Deliver effects in order. A closed queue does not stop later
    /// broadcasts; refused jobs are reported back to the caller.
    pub fn dispatch(&self, outbound: Vec<Outbound>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in outbound {
            match effect {
                Outbound::Broadcast(broadcast) => {
                    let reached = self.broadcaster.publish(&broadcast);
                    debug!(
                        channel = %broadcast.channel,
                        event = broadcast.event.name(),
                        reached,
                        "Broadcast published"
                    );
                    report.published += 1;
                }
                Outbound::ScheduleAiResponse(job) => {
                    if let Err(err) = self.queue.enqueue(job.clone()) {
                        error!(chat_id = %job.chat_id, job_id = %job.id, error = %err, "Could not schedule AI job");
                        report.rejected_jobs.push(job);
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::jobs::job_channel;
    use chrono::Utc;
    use helpdesk_core::{Broadcast, ChatId, Message, MessageId, MessageType};

    fn message() -> Message {
        Message {
            id: MessageId(1),
            chat_id: ChatId(2),
            user_id: None,
            message_type: MessageType::System,
            content: "notice".into(),
            is_transfer_request: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_effects_are_routed() {
        let recorder = RecordingBroadcaster::new();
        let (queue, mut receiver) = job_channel();
        let dispatcher = Dispatcher::new(Arc::new(recorder.clone()), queue);

        let report = dispatcher.dispatch(vec![
            Outbound::Broadcast(Broadcast::message_sent(&message())),
            Outbound::ScheduleAiResponse(AiJob::new(ChatId(2), "hello")),
        ]);

        assert!(report.is_complete());
        assert_eq!(report.published, 1);
        assert_eq!(recorder.published().len(), 1);
        let job = receiver.try_next_job().unwrap();
        assert_eq!(job.user_message, "hello");
    }

    #[test]
    fn test_closed_queue_reports_job_and_keeps_broadcasting() {
        let recorder = RecordingBroadcaster::new();
        let (queue, receiver) = job_channel();
        drop(receiver);
        let dispatcher = Dispatcher::new(Arc::new(recorder.clone()), queue);

        let report = dispatcher.dispatch(vec![
            Outbound::ScheduleAiResponse(AiJob::new(ChatId(2), "hello")),
            Outbound::Broadcast(Broadcast::message_sent(&message())),
        ]);

        assert_eq!(report.rejected_jobs.len(), 1);
        assert_eq!(recorder.published().len(), 1);
    }
}
