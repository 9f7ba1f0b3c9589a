//! Reference-counted remote feed
//!
//! Each subscription of an authenticated engine holds an `Arc<RemoteFeed>`.
//! The first one opens the transport feed; dropping the last one aborts the
//! task and with it the transport's receiver.

use super::uploader::Backoff;
use super::{Engine, EngineInner};
use crate::transport::Transport;
use crate::Error;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

pub(crate) struct RemoteFeed {
    task: JoinHandle<()>,
}

impl RemoteFeed {
    pub(crate) fn start(
        engine: Weak<EngineInner>,
        transport: Arc<dyn Transport>,
        capacity: usize,
        backoff: Backoff,
    ) -> Self {
        tracing::debug!(capacity, "Opening remote feed");
        Self {
            task: tokio::spawn(run(engine, transport, capacity, backoff)),
        }
    }
}

impl Drop for RemoteFeed {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("Remote feed closed, no subscribers left");
    }
}

async fn run(
    engine: Weak<EngineInner>,
    transport: Arc<dyn Transport>,
    capacity: usize,
    mut backoff: Backoff,
) {
    loop {
        let mut batches = match transport.subscribe(capacity).await {
            Ok(batches) => {
                backoff.reset();
                batches
            }
            Err(e @ (Error::Unauthorized(_) | Error::SessionClosed)) => {
                tracing::error!(error = %e, "Remote feed stopped");
                return;
            }
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Failed to open remote feed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        while let Some(batch) = batches.recv().await {
            // The session may have ended while we waited
            let Some(inner) = engine.upgrade() else {
                return;
            };
            let count = batch.len();
            if let Err(e) = (Engine { inner }).pulled(batch).await {
                tracing::warn!(count, error = %e, "Failed to apply remote batch");
            }
        }

        tracing::debug!("Remote feed ended, reconnecting");
        tokio::time::sleep(backoff.next_delay()).await;
    }
}
