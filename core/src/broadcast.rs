//! Multi-subscriber fan-out for engine updates
//!
//! Publishing never blocks: each subscriber owns an unbounded queue and the
//! registry only holds the sending half. Subscribers whose receiver is gone
//! are pruned on the next publish.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Resource kept alive for as long as a subscription lives
pub type Lease = Arc<dyn Any + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    subscribers: BTreeMap<u64, UnboundedSender<T>>,
}

pub struct Broadcast<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: BTreeMap::new(),
            })),
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.subscribers.insert(id, sender);

        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
            lease: None,
            cancelled: false,
        }
    }

    /// Deliver `value` to every live subscriber. Returns how many got it.
    pub fn notify(&self, value: T) -> usize {
        let mut registry = self.registry.lock();
        registry
            .subscribers
            .retain(|_, sender| sender.send(value.clone()).is_ok());
        registry.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut registry = self.registry.lock();
        registry.subscribers.retain(|_, sender| !sender.is_closed());
        registry.subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a [`Broadcast`]
///
/// Only sees values published after it was created. Dropping it (or
/// calling [`cancel`](Subscription::cancel)) removes it from the registry.
pub struct Subscription<T> {
    id: u64,
    receiver: UnboundedReceiver<T>,
    registry: Weak<Mutex<Registry<T>>>,
    lease: Option<Lease>,
    cancelled: bool,
}

impl<T> Subscription<T> {
    /// Tie `lease` to this subscription's lifetime
    pub fn with_lease(mut self, lease: Lease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Next value, or `None` once cancelled or the broadcast is gone
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Stop receiving future values. Already queued values stay readable.
    pub fn cancel(&mut self) {
        self.deregister();
        self.receiver.close();
        self.lease = None;
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().subscribers.remove(&self.id);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.deregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let broadcast = Broadcast::new();
        let mut a = broadcast.subscribe();
        let mut b = broadcast.subscribe();

        assert_eq!(broadcast.notify(7u32), 2);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[test]
    fn test_late_subscriber_misses_earlier_values() {
        let broadcast = Broadcast::new();
        broadcast.notify(1u32);
        let mut late = broadcast.subscribe();
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_dropped_subscription_is_removed() {
        let broadcast = Broadcast::<u32>::new();
        let kept = broadcast.subscribe();
        let dropped = broadcast.subscribe();
        assert_eq!(broadcast.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(broadcast.subscriber_count(), 1);
        assert_eq!(broadcast.notify(1), 1);
        drop(kept);
    }

    #[test]
    fn test_cancel_stops_future_values_only() {
        let broadcast = Broadcast::new();
        let mut subscription = broadcast.subscribe();
        broadcast.notify(1u32);

        subscription.cancel();
        assert_eq!(broadcast.notify(2), 0);
        assert_eq!(subscription.try_recv().ok(), Some(1));
        assert!(matches!(subscription.try_recv(), Err(TryRecvError::Disconnected)));
        assert!(subscription.is_cancelled());
    }

    #[test]
    fn test_lease_released_with_subscription() {
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicUsize::new(0));
        let broadcast = Broadcast::<u32>::new();
        let mut first = broadcast
            .subscribe()
            .with_lease(Arc::new(Counted(Arc::clone(&released))));

        first.cancel();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
