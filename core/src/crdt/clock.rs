//! Operation timestamps and the operation factory
//!
//! `created_at` is plain wall-clock milliseconds, but a device must never
//! issue a timestamp at or below one it already issued or observed, or its
//! own later edit could lose to an earlier one. [`Clock`] enforces that the
//! way a hybrid logical clock does: take the wall time, bump past the last
//! known value when the wall clock lags.

use crate::operation::{Operation, OperationPayload};
use crate::types::{AuthorId, OpId};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

fn wall_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Thread-safe monotonic millisecond clock
pub struct Clock {
    last: AtomicI64,
    source: fn() -> i64,
}

impl Clock {
    pub fn new() -> Self {
        Self::with_source(wall_millis)
    }

    /// Clock reading time from `source` (fixed sources make tests deterministic)
    pub fn with_source(source: fn() -> i64) -> Self {
        Self {
            last: AtomicI64::new(i64::MIN),
            source,
        }
    }

    /// Next timestamp: wall time, or one past the last known value.
    ///
    /// Saturates at `i64::MAX`; from there on ties are broken by id.
    pub fn tick(&self) -> i64 {
        let now = (self.source)();
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = if now > last { now } else { last.saturating_add(1) };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Record a timestamp seen on a remote operation
    pub fn observe(&self, remote: i64) {
        self.last.fetch_max(remote, Ordering::AcqRel);
    }

    pub fn last(&self) -> Option<i64> {
        match self.last.load(Ordering::Acquire) {
            i64::MIN => None,
            value => Some(value),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Stamps payloads into operations authored by one device
pub struct OperationFactory {
    author: AuthorId,
    clock: Clock,
}

impl OperationFactory {
    pub fn new(author: AuthorId) -> Self {
        Self::with_clock(author, Clock::new())
    }

    pub fn with_clock(author: AuthorId, clock: Clock) -> Self {
        Self { author, clock }
    }

    pub fn author(&self) -> &AuthorId {
        &self.author
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn make(&self, payload: OperationPayload) -> Operation {
        Operation::new(OpId::generate(), self.author.clone(), self.clock.tick(), payload)
    }

    /// Make one operation per payload with strictly increasing timestamps
    pub fn make_all<I>(&self, payloads: I) -> Vec<Operation>
    where
        I: IntoIterator<Item = OperationPayload>,
    {
        payloads.into_iter().map(|payload| self.make(payload)).collect()
    }
}
