//! Session engine
//!
//! The [`Engine`] owns one session's operation log and merged [`State`].
//! Local edits come in through [`Engine::push`], server deliveries through
//! [`Engine::pulled`]; both take the same path:
//!
//! 1. Take the apply lock (the single serialization point)
//! 2. Persist the batch; on failure nothing else happens
//! 3. Reduce the batch into a new State and swap it in atomically
//! 4. Broadcast an [`Update`] to subscribers
//!
//! Authenticated sessions additionally hand local batches to a background
//! uploader and, while anyone subscribes, keep a remote feed open.

mod feed;
mod uploader;


use crate::broadcast::{Broadcast, Subscription};
use crate::config::EngineConfig;
use crate::crdt::OperationFactory;
use crate::operation::{sort_in_merge_order, Operation, OperationPayload};
use crate::reducer::reduce_all;
use crate::state::State;
use crate::storage::OperationStore;
use crate::transport::Transport;
use crate::types::{AuthorId, OpId};
use crate::{Error, Result};
use feed::RemoteFeed;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uploader::Backoff;

/// How a session relates to the server. Fixed for the engine's lifetime;
/// signing in means opening a new engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Local-only: operations never leave the device
    Sandbox,
    /// Operations are also uploaded and received through a transport
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Operations that were just applied
#[derive(Debug, Clone)]
pub struct Update {
    pub origin: Origin,
    pub operations: Arc<[Operation]>,
}

pub(crate) struct EngineInner {
    mode: SessionMode,
    config: EngineConfig,
    store: Arc<dyn OperationStore>,
    transport: Option<Arc<dyn Transport>>,
    factory: OperationFactory,
    log: Mutex<HashMap<OpId, Operation>>,
    state: watch::Sender<Arc<State>>,
    updates: Broadcast<Update>,
    outbox: Option<mpsc::UnboundedSender<Vec<Operation>>>,
    uploader: Option<JoinHandle<()>>,
    feed: parking_lot::Mutex<Weak<RemoteFeed>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(uploader) = self.uploader.take() {
            uploader.abort();
        }
        tracing::debug!(mode = ?self.mode, "Engine session ended");
    }
}

/// Handle to a running session. Clones share the session; it ends when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Open a session over `store`, replaying the persisted log.
    ///
    /// Authenticated sessions need a `transport`; operations still pending
    /// from an earlier session are queued for upload again.
    pub async fn open(
        mode: SessionMode,
        config: EngineConfig,
        store: Arc<dyn OperationStore>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self> {
        config.validate()?;

        let transport = match (mode, transport) {
            (SessionMode::Authenticated, None) => {
                return Err(Error::Config(
                    "authenticated session requires a transport".to_string(),
                ))
            }
            (SessionMode::Sandbox, Some(_)) => {
                tracing::warn!("Sandbox session ignores the supplied transport");
                None
            }
            (_, transport) => transport,
        };

        let mut operations = store.load_all()?;
        sort_in_merge_order(&mut operations);
        let state = reduce_all(State::default(), &operations);

        let author = config.author_id.clone().unwrap_or_else(AuthorId::generate);
        let factory = OperationFactory::new(author);
        if let Some(last) = operations.last() {
            factory.clock().observe(last.created_at);
        }

        tracing::info!(
            mode = ?mode,
            author = %factory.author(),
            operations = operations.len(),
            "Engine session opened"
        );

        let (outbox, uploader) = match &transport {
            Some(transport) => {
                let (sender, receiver) = mpsc::unbounded_channel();
                let mut pending = store.pending()?;
                if !pending.is_empty() {
                    sort_in_merge_order(&mut pending);
                    tracing::info!(count = pending.len(), "Re-queueing operations pending sync");
                    let _ = sender.send(pending);
                }
                let handle = tokio::spawn(uploader::run(
                    Arc::clone(&store),
                    Arc::clone(transport),
                    receiver,
                    Backoff::from_config(&config),
                ));
                (Some(sender), Some(handle))
            }
            None => (None, None),
        };

        let log = operations
            .into_iter()
            .map(|operation| (operation.id.clone(), operation))
            .collect();
        let (state, _) = watch::channel(Arc::new(state));

        Ok(Self {
            inner: Arc::new(EngineInner {
                mode,
                config,
                store,
                transport,
                factory,
                log: Mutex::new(log),
                state,
                updates: Broadcast::new(),
                outbox,
                uploader,
                feed: parking_lot::Mutex::new(Weak::new()),
            }),
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Factory for this session's local operations
    pub fn factory(&self) -> &OperationFactory {
        &self.inner.factory
    }

    /// Apply locally authored operations.
    ///
    /// Returns once they are durable and merged. In an authenticated session
    /// upload happens afterwards in the background.
    pub async fn push(&self, operations: Vec<Operation>) -> Result<()> {
        self.apply(operations, Origin::Local).await
    }

    /// Apply operations received from the server
    pub async fn pulled(&self, operations: Vec<Operation>) -> Result<()> {
        self.apply(operations, Origin::Remote).await
    }

    /// Stamp `payloads` as new local operations and push them
    pub async fn submit(&self, payloads: Vec<OperationPayload>) -> Result<Vec<Operation>> {
        let operations = self.inner.factory.make_all(payloads);
        self.push(operations.clone()).await?;
        Ok(operations)
    }

    /// Updates applied after this call. In an authenticated session the
    /// subscription also keeps the remote feed open.
    pub fn subscribe(&self) -> Subscription<Update> {
        let subscription = self.inner.updates.subscribe();
        match self.acquire_feed() {
            Some(feed) => subscription.with_lease(feed),
            None => subscription,
        }
    }

    /// Current merged state. Never reflects part of a batch.
    pub fn state(&self) -> Arc<State> {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<Arc<State>> {
        self.inner.state.subscribe()
    }

    /// Full log in merge order
    pub async fn operations(&self) -> Vec<Operation> {
        let log = self.inner.log.lock().await;
        let mut operations: Vec<Operation> = log.values().cloned().collect();
        sort_in_merge_order(&mut operations);
        operations
    }

    /// Local operations not yet acknowledged by the server
    pub fn pending_sync(&self) -> Result<usize> {
        Ok(self.inner.store.pending()?.len())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.updates.subscriber_count()
    }

    pub fn remote_feed_active(&self) -> bool {
        self.inner.feed.lock().strong_count() > 0
    }

    async fn apply(&self, operations: Vec<Operation>, origin: Origin) -> Result<()> {
        let inner = &self.inner;
        let mut log = inner.log.lock().await;

        // Exact redeliveries change nothing and are not re-announced
        let mut operations = latest_by_id(operations);
        operations.retain(|operation| log.get(&operation.id) != Some(operation));
        if operations.is_empty() {
            return Ok(());
        }
        sort_in_merge_order(&mut operations);

        let pending = origin == Origin::Local && inner.outbox.is_some();
        if let Err(e) = inner.store.put_all(&operations, pending) {
            tracing::warn!(
                origin = ?origin,
                count = operations.len(),
                error = %e,
                "Failed to persist batch, state left unchanged"
            );
            return Err(e);
        }

        let replaces_known = operations
            .iter()
            .any(|operation| log.contains_key(&operation.id));
        for operation in &operations {
            inner.factory.clock().observe(operation.created_at);
            log.insert(operation.id.clone(), operation.clone());
        }

        // A changed payload under a known id may target other entities, so
        // the state is rebuilt from the whole log in that case.
        let next = if replaces_known {
            let mut all: Vec<Operation> = log.values().cloned().collect();
            sort_in_merge_order(&mut all);
            reduce_all(State::default(), &all)
        } else {
            let current = inner.state.borrow().clone();
            reduce_all(State::clone(&current), &operations)
        };
        inner.state.send_replace(Arc::new(next));

        tracing::debug!(
            origin = ?origin,
            count = operations.len(),
            log_len = log.len(),
            "Applied batch"
        );

        let operations: Arc<[Operation]> = operations.into();
        inner.updates.notify(Update {
            origin,
            operations: Arc::clone(&operations),
        });

        if pending {
            if let Some(outbox) = &inner.outbox {
                if outbox.send(operations.to_vec()).is_err() {
                    tracing::warn!("Uploader stopped, operations stay pending sync");
                }
            }
        }
        Ok(())
    }

    fn acquire_feed(&self) -> Option<Arc<RemoteFeed>> {
        let transport = self.inner.transport.as_ref()?;
        let mut slot = self.inner.feed.lock();
        if let Some(feed) = slot.upgrade() {
            return Some(feed);
        }

        let feed = Arc::new(RemoteFeed::start(
            Arc::downgrade(&self.inner),
            Arc::clone(transport),
            self.inner.config.remote_feed_capacity,
            Backoff::from_config(&self.inner.config),
        ));
        *slot = Arc::downgrade(&feed);
        Some(feed)
    }
}

/// Keep only the last copy of each id within one batch
fn latest_by_id(operations: Vec<Operation>) -> Vec<Operation> {
    let mut seen = HashSet::new();
    let mut latest: Vec<Operation> = operations
        .into_iter()
        .rev()
        .filter(|operation| seen.insert(operation.id.clone()))
        .collect();
    latest.reverse();
    latest
}
