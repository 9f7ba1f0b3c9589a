//! Durable operation log
//!
//! The engine never talks to a database directly; it goes through
//! [`OperationStore`]. Every write is all-or-nothing per batch so a failed
//! push leaves neither the log nor the in-memory state half updated.
//!
//! - [`RocksStore`]: RocksDB, one `WriteBatch` per call
//! - [`MemoryStore`]: in-process map, used by tests and throwaway sessions

pub mod memory;
pub mod store;

use crate::operation::Operation;
use crate::types::OpId;
use crate::Result;

pub use memory::MemoryStore;
pub use store::RocksStore;

pub trait OperationStore: Send + Sync {
    /// Upsert `operations` by id. With `pending` set, each one is also
    /// marked as awaiting upload.
    fn put_all(&self, operations: &[Operation], pending: bool) -> Result<()>;

    /// Every stored operation, in no particular order
    fn load_all(&self) -> Result<Vec<Operation>>;

    /// Operations still marked as awaiting upload
    fn pending(&self) -> Result<Vec<Operation>>;

    /// Clear the pending marker of each id. Unknown ids are ignored.
    fn mark_synced(&self, ids: &[OpId]) -> Result<()>;
}
