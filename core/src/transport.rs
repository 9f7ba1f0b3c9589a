//! Server transport seam
//!
//! An authenticated engine pushes its local operations through a
//! [`Transport`] and receives everyone else's from it. Retries are the
//! caller's business; a transport reports one attempt at a time.
//!
//! [`MemoryRelay`] plays the server in-process: it keeps the shared log,
//! fans pushed batches out to every subscriber and replays the log to new
//! ones.

use crate::operation::Operation;
use crate::types::OpId;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload a batch of locally authored operations
    async fn push(&self, operations: &[Operation]) -> Result<()>;

    /// Open a live feed of remote batches buffered up to `capacity`.
    /// The feed ends when the receiver is dropped.
    async fn subscribe(&self, capacity: usize) -> Result<mpsc::Receiver<Vec<Operation>>>;
}

#[derive(Default)]
struct RelayLog {
    operations: Vec<Operation>,
    seen: HashSet<OpId>,
    subscribers: Vec<mpsc::Sender<Vec<Operation>>>,
}

/// In-process relay server
#[derive(Default)]
pub struct MemoryRelay {
    log: Mutex<RelayLog>,
    failures_left: AtomicUsize,
    revoked: AtomicBool,
    closed: AtomicBool,
    push_attempts: AtomicUsize,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` pushes with a transport error
    pub fn fail_next_pushes(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Reject every later push as unauthorized
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Shut the relay down: drop every feed and refuse new calls
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.log.lock().subscribers.clear();
    }

    /// Operations accepted so far, in arrival order
    pub fn operations(&self) -> Vec<Operation> {
        self.log.lock().operations.clone()
    }

    pub fn push_attempts(&self) -> usize {
        self.push_attempts.load(Ordering::SeqCst)
    }

    /// Feeds whose receiver is still alive
    pub fn subscriber_count(&self) -> usize {
        let mut log = self.log.lock();
        log.subscribers.retain(|sender| !sender.is_closed());
        log.subscribers.len()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryRelay {
    async fn push(&self, operations: &[Operation]) -> Result<()> {
        self.push_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;
        if self.revoked.load(Ordering::SeqCst) {
            return Err(Error::Unauthorized("relay token revoked".to_string()));
        }
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::Transport("relay unavailable".to_string()));
        }

        let (fresh, subscribers) = {
            let mut log = self.log.lock();
            let fresh: Vec<Operation> = operations
                .iter()
                .filter(|operation| log.seen.insert(operation.id.clone()))
                .cloned()
                .collect();
            log.operations.extend(fresh.iter().cloned());
            log.subscribers.retain(|sender| !sender.is_closed());
            (fresh, log.subscribers.clone())
        };

        if fresh.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            count = fresh.len(),
            subscribers = subscribers.len(),
            "Relay fanning out batch"
        );
        for subscriber in subscribers {
            // A closed feed is pruned on the next push
            let _ = subscriber.send(fresh.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, capacity: usize) -> Result<mpsc::Receiver<Vec<Operation>>> {
        self.check_open()?;

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mut log = self.log.lock();
        if !log.operations.is_empty() {
            sender
                .try_send(log.operations.clone())
                .map_err(|e| Error::Transport(format!("Failed to replay log: {}", e)))?;
        }
        log.subscribers.push(sender);
        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationPayload, UpdateEmail};
    use crate::types::AuthorId;

    fn op(id: &str) -> Operation {
        Operation::new(
            OpId::from(id),
            AuthorId::from("device"),
            1,
            OperationPayload::UpdateEmail(UpdateEmail { email: "a@x".to_string() }),
        )
    }

    #[tokio::test]
    async fn test_fan_out_to_subscribers() {
        let relay = MemoryRelay::new();
        let mut feed = relay.subscribe(4).await.unwrap();

        relay.push(&[op("a"), op("b")]).await.unwrap();
        let batch = feed.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn test_new_subscriber_gets_replay() {
        let relay = MemoryRelay::new();
        relay.push(&[op("a")]).await.unwrap();

        let mut feed = relay.subscribe(4).await.unwrap();
        assert_eq!(feed.recv().await.unwrap(), vec![op("a")]);
    }

    #[tokio::test]
    async fn test_duplicate_push_is_not_refanned() {
        let relay = MemoryRelay::new();
        let mut feed = relay.subscribe(4).await.unwrap();

        relay.push(&[op("a")]).await.unwrap();
        relay.push(&[op("a")]).await.unwrap();
        assert_eq!(relay.operations().len(), 1);
        assert!(feed.recv().await.is_some());
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let relay = MemoryRelay::new();
        relay.fail_next_pushes(1);
        assert!(matches!(relay.push(&[op("a")]).await, Err(Error::Transport(_))));
        relay.push(&[op("a")]).await.unwrap();

        relay.revoke();
        assert!(matches!(relay.push(&[op("b")]).await, Err(Error::Unauthorized(_))));
        assert_eq!(relay.push_attempts(), 3);
    }

    #[tokio::test]
    async fn test_dropped_feed_is_pruned() {
        let relay = MemoryRelay::new();
        let feed = relay.subscribe(4).await.unwrap();
        assert_eq!(relay.subscriber_count(), 1);
        drop(feed);
        assert_eq!(relay.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_relay_refuses_calls() {
        let relay = MemoryRelay::new();
        let mut feed = relay.subscribe(4).await.unwrap();
        relay.close();

        assert!(feed.recv().await.is_none());
        assert!(matches!(relay.push(&[op("a")]).await, Err(Error::SessionClosed)));
        assert!(relay.subscribe(4).await.is_err());
    }
}
