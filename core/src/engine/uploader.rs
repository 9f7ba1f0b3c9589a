//! Background upload of locally authored operations

use crate::config::EngineConfig;
use crate::operation::Operation;
use crate::storage::OperationStore;
use crate::transport::Transport;
use crate::types::OpId;
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Exponential retry delay, doubling up to a ceiling
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub(crate) fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.upload_backoff_initial(), config.upload_backoff_max())
    }

    /// Delay to wait now; the following one doubles
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Upload queued batches in order until the outbox closes.
///
/// Transient failures are retried with backoff. An unauthorized or closed
/// session stops the uploader; the operations stay marked pending in the
/// store and are re-queued by the next session.
pub(crate) async fn run(
    store: Arc<dyn OperationStore>,
    transport: Arc<dyn Transport>,
    mut outbox: UnboundedReceiver<Vec<Operation>>,
    mut backoff: Backoff,
) {
    while let Some(mut batch) = outbox.recv().await {
        while let Ok(more) = outbox.try_recv() {
            batch.extend(more);
        }

        loop {
            match transport.push(&batch).await {
                Ok(()) => {
                    backoff.reset();
                    let ids: Vec<OpId> = batch.iter().map(|operation| operation.id.clone()).collect();
                    match store.mark_synced(&ids) {
                        Ok(()) => tracing::debug!(count = ids.len(), "Uploaded operations"),
                        Err(e) => tracing::warn!(
                            count = ids.len(),
                            error = %e,
                            "Uploaded operations but failed to clear pending markers"
                        ),
                    }
                    break;
                }
                Err(e @ (Error::Unauthorized(_) | Error::SessionClosed)) => {
                    tracing::error!(
                        error = %e,
                        count = batch.len(),
                        "Upload stopped, operations stay pending sync"
                    );
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        count = batch.len(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    tracing::debug!("Uploader outbox closed");
}
