//! Publish/subscribe gateway.
//!
//! Delivery is best-effort and at-most-once: publishing to a channel with no
//! subscribers is not an error, lagging subscribers lose the oldest events,
//! and nothing is replayed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use helpdesk_core::{Broadcast, Channel, UserId};

/// Default per-channel buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Something that can deliver broadcasts.
pub trait Broadcaster: Send + Sync {
    /// Publish one broadcast. Returns the number of receivers reached.
    fn publish(&self, broadcast: &Broadcast) -> usize;
}

/// In-process hub with one `tokio::sync::broadcast` sender per channel.
pub struct ChannelHub {
    capacity: usize,
    senders: RwLock<HashMap<Channel, broadcast::Sender<Broadcast>>>,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a channel. Broadcasts excluding `subscriber` are skipped.
    pub fn subscribe(&self, channel: Channel, subscriber: Option<UserId>) -> Subscription {
        let receiver = {
            let mut senders = self.senders.write();
            senders
                .entry(channel)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        debug!(%channel, ?subscriber, "Subscribed");
        Subscription {
            channel,
            subscriber,
            receiver,
        }
    }

    /// Active receivers on a channel.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.senders
            .read()
            .get(&channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Broadcaster for ChannelHub {
    fn publish(&self, broadcast: &Broadcast) -> usize {
        let senders = self.senders.read();
        let Some(sender) = senders.get(&broadcast.channel) else {
            debug!(channel = %broadcast.channel, event = broadcast.event.name(), "No subscribers");
            return 0;
        };
        match sender.send(broadcast.clone()) {
            Ok(reached) => reached,
            Err(_) => 0,
        }
    }
}

/// A subscriber's view of one channel.
pub struct Subscription {
    channel: Channel,
    subscriber: Option<UserId>,
    receiver: broadcast::Receiver<Broadcast>,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Next visible broadcast; `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Broadcast> {
        loop {
            match self.receiver.recv().await {
                Ok(broadcast) if broadcast.is_visible_to(self.subscriber) => return Some(broadcast),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next visible broadcast if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Broadcast> {
        loop {
            match self.receiver.try_recv() {
                Ok(broadcast) if broadcast.is_visible_to(self.subscriber) => return Some(broadcast),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Broadcaster that records everything it is given.
#[derive(Clone, Default)]
pub struct RecordingBroadcaster {
    published: Arc<RwLock<Vec<Broadcast>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Broadcast> {
        self.published.read().clone()
    }

    pub fn published_on(&self, channel: Channel) -> Vec<Broadcast> {
        self.published
            .read()
            .iter()
            .filter(|b| b.channel == channel)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.published.write().clear();
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, broadcast: &Broadcast) -> usize {
        self.published.write().push(broadcast.clone());
        1
    }
}
