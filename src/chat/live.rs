use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::UserId;

use super::Message;

struct Registration {
    channel_id: u64,
    tx: mpsc::Sender<Message>,
}

/// Receiving half handed to a connection when it registers. The stream ends
/// when the registration is replaced or removed.
pub struct Subscription {
    pub channel_id: u64,
    pub receiver: mpsc::Receiver<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Offline,
    Online { channel_id: u64 },
}

/// Who is online, and the channel to push their messages to.
///
/// At most one channel per user: registering again replaces the previous
/// channel and dropping its sender closes it. Entries are swapped per key, so
/// unrelated users never contend. Pushes are best effort and at most once;
/// the message log stays the source of truth.
#[derive(Clone)]
pub struct LiveRouter {
    channels: Arc<DashMap<UserId, Registration>>,
    next_channel_id: Arc<AtomicU64>,
    capacity: usize,
}

impl LiveRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            next_channel_id: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn register(&self, user_id: &UserId) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.capacity);
        let channel_id = self.next_channel_id.fetch_add(1, Ordering::Relaxed);

        match self.channels.insert(user_id.clone(), Registration { channel_id, tx }) {
            Some(previous) => info!(%user_id, channel_id, replaced = previous.channel_id, "channel replaced"),
            None => info!(%user_id, channel_id, "online"),
        }

        Subscription { channel_id, receiver }
    }

    /// Removes the registration only if it is still `channel_id`, so a late
    /// disconnect of a replaced channel leaves the newer one alone.
    pub fn unregister(&self, user_id: &UserId, channel_id: u64) -> bool {
        let removed = self
            .channels
            .remove_if(user_id, |_, registration| registration.channel_id == channel_id)
            .is_some();
        if removed {
            info!(%user_id, channel_id, "offline");
        }
        removed
    }

    pub fn presence(&self, user_id: &UserId) -> Presence {
        match self.channels.get(user_id) {
            Some(registration) => Presence::Online {
                channel_id: registration.channel_id,
            },
            None => Presence::Offline,
        }
    }

    pub fn online_count(&self) -> usize {
        self.channels.len()
    }

    /// Pushes `message` to its receiver's channel. Returns whether it was
    /// queued; an offline receiver picks the message up from the log.
    pub fn fan_out(&self, message: &Message) -> bool {
        let receiver_id = &message.receiver_id;
        // the map guard must be released before remove_if on the same key
        let (channel_id, outcome) = match self.channels.get(receiver_id) {
            Some(registration) => (
                registration.channel_id,
                registration.tx.try_send(message.clone()),
            ),
            None => {
                debug!(receiver = %receiver_id, "receiver offline");
                return false;
            }
        };

        match outcome {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(receiver = %receiver_id, channel_id, id = %message.id, "push dropped, channel full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.unregister(receiver_id, channel_id);
                false
            }
        }
    }
}
