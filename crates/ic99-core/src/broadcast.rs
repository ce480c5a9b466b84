//! Telemetry fan-out
//!
//! Every decoded sample is offered to each live subscriber's bounded queue.
//! Delivery never waits: a subscriber whose queue is full misses that sample,
//! so a slow consumer cannot hold up frame ingestion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::charger::ChargerData;

/// Queue depth of each subscriber
pub const SUBSCRIBER_CAPACITY: usize = 10;

/// Receiving end of a subscription
pub type SampleReceiver = mpsc::Receiver<Arc<ChargerData>>;

type Senders = HashMap<u64, mpsc::Sender<Arc<ChargerData>>>;
type Registry = Mutex<Senders>;

/// Registry of live subscribers for one device
#[derive(Default)]
pub struct Broadcaster {
    subscribers: Arc<Registry>,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    ///
    /// Returns the sample queue and the handle that removes it again.
    pub fn subscribe(&self) -> (SampleReceiver, Unsubscribe) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).insert(id, tx);
        tracing::debug!("subscriber {} registered", id);

        let handle = Unsubscribe {
            id,
            registry: Arc::downgrade(&self.subscribers),
        };
        (rx, handle)
    }

    /// Offer a sample to every current subscriber
    pub fn broadcast(&self, sample: ChargerData) {
        // Snapshot under the lock, deliver outside it
        let targets: Vec<(u64, mpsc::Sender<Arc<ChargerData>>)> = lock(&self.subscribers)
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();
        if targets.is_empty() {
            return;
        }

        let sample = Arc::new(sample);
        let mut closed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&sample)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("subscriber {} is lagging, dropped sample", id);
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut subs = lock(&self.subscribers);
            for id in closed {
                subs.remove(&id);
                tracing::debug!("subscriber {} went away", id);
            }
        }
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

/// Removes a subscription from its broadcaster. Safe to call more than once.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    id: u64,
    registry: Weak<Registry>,
}

impl Unsubscribe {
    /// Remove the subscription; later broadcasts no longer reach it
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if lock(&registry).remove(&self.id).is_some() {
                tracing::debug!("subscriber {} unsubscribed", self.id);
            }
        }
    }
}

// Poisoning is ignored: no update to the map can be left half done
fn lock(registry: &Registry) -> MutexGuard<'_, Senders> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuilder;

    fn sample(id: &str) -> ChargerData {
        ChargerData::from_frame(id, &FrameBuilder::new().build())
    }

    #[test]
    fn test_fan_out_to_all() {
        let hub = Broadcaster::new();
        let (mut a, _ua) = hub.subscribe();
        let (mut b, _ub) = hub.subscribe();

        hub.broadcast(sample("dev"));

        assert_eq!(a.try_recv().unwrap().id, "dev");
        assert_eq!(b.try_recv().unwrap().id, "dev");
    }

    #[test]
    fn test_unsubscribed_receives_nothing() {
        let hub = Broadcaster::new();
        let (mut a, ua) = hub.subscribe();
        let (mut b, _ub) = hub.subscribe();

        ua.unsubscribe();
        ua.unsubscribe();
        assert_eq!(hub.subscriber_count(), 1);

        hub.broadcast(sample("dev"));
        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let hub = Broadcaster::new();
        let (mut slow, _u) = hub.subscribe();

        for i in 0..SUBSCRIBER_CAPACITY + 5 {
            hub.broadcast(sample(&i.to_string()));
        }

        // The oldest samples are kept, in order
        for i in 0..SUBSCRIBER_CAPACITY {
            assert_eq!(slow.try_recv().unwrap().id, i.to_string());
        }
        assert!(slow.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let hub = Broadcaster::new();
        let (rx, _u) = hub.subscribe();
        drop(rx);
        assert_eq!(hub.subscriber_count(), 1);

        hub.broadcast(sample("dev"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_after_broadcaster_dropped() {
        let hub = Broadcaster::new();
        let (_rx, u) = hub.subscribe();
        drop(hub);
        u.unsubscribe();
    }
}
