//! In-process operation store

use super::OperationStore;
use crate::operation::Operation;
use crate::types::OpId;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Inner {
    operations: HashMap<OpId, Operation>,
    pending: BTreeSet<OpId>,
}

/// Volatile [`OperationStore`]. Writes can be made to fail on demand so
/// callers can exercise their error paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `put_all` and `mark_synced` fail without touching the log
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("write rejected by memory store".to_string()));
        }
        Ok(())
    }
}

impl OperationStore for MemoryStore {
    fn put_all(&self, operations: &[Operation], pending: bool) -> Result<()> {
        self.check_writable()?;

        let mut inner = self.inner.lock();
        for operation in operations {
            inner
                .operations
                .insert(operation.id.clone(), operation.clone());
            if pending {
                inner.pending.insert(operation.id.clone());
            }
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Operation>> {
        Ok(self.inner.lock().operations.values().cloned().collect())
    }

    fn pending(&self) -> Result<Vec<Operation>> {
        let inner = self.inner.lock();
        Ok(inner
            .pending
            .iter()
            .filter_map(|id| inner.operations.get(id).cloned())
            .collect())
    }

    fn mark_synced(&self, ids: &[OpId]) -> Result<()> {
        self.check_writable()?;

        let mut inner = self.inner.lock();
        for id in ids {
            inner.pending.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationPayload, VerifyEmail};
    use crate::types::AuthorId;

    fn op(id: &str) -> Operation {
        Operation::new(
            OpId::from(id),
            AuthorId::from("device"),
            1,
            OperationPayload::VerifyEmail(VerifyEmail { email: "a@x".to_string() }),
        )
    }

    #[test]
    fn test_failed_write_leaves_log_untouched() {
        let store = MemoryStore::new();
        store.put_all(&[op("a")], true).unwrap();

        store.set_fail_writes(true);
        assert!(matches!(store.put_all(&[op("b")], true), Err(Error::Storage(_))));
        assert!(store.mark_synced(&[OpId::from("a")]).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending().unwrap().len(), 1);

        store.set_fail_writes(false);
        store.put_all(&[op("b")], false).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_mark_synced_ignores_unknown_ids() {
        let store = MemoryStore::new();
        store.put_all(&[op("a")], true).unwrap();
        store
            .mark_synced(&[OpId::from("a"), OpId::from("nope")])
            .unwrap();
        assert!(store.pending().unwrap().is_empty());
    }
}
