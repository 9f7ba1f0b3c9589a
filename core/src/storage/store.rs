//! RocksDB-based persistent storage

use super::OperationStore;
use crate::operation::Operation;
use crate::types::OpId;
use crate::version::{is_schema_compatible, SCHEMA_VERSION};
use crate::{Error, Result};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;

const OP_PREFIX: &[u8] = b"op:";
const PENDING_PREFIX: &[u8] = b"pending:";
const SCHEMA_KEY: &[u8] = b"meta:schema";

/// Operation log backed by RocksDB
///
/// Keys are `op:<id>` (JSON-encoded operation) and `pending:<id>` (empty
/// marker for operations not yet acknowledged by the server). `meta:schema`
/// records the layout version the log was created with.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a store at the given path.
    ///
    /// Fails when the log was written by a build with a newer schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        let store = Self { db };
        store.check_schema()?;
        Ok(store)
    }

    /// Schema version recorded in the log
    pub fn schema_version(&self) -> Result<Option<u32>> {
        let value = self
            .db
            .get(SCHEMA_KEY)
            .map_err(|e| Error::Storage(format!("Failed to read schema version: {}", e)))?;
        let Some(value) = value else {
            return Ok(None);
        };
        let bytes: [u8; 4] = value.as_slice().try_into().map_err(|_| {
            Error::Storage(format!("Corrupt schema version ({} bytes)", value.len()))
        })?;
        Ok(Some(u32::from_be_bytes(bytes)))
    }

    fn check_schema(&self) -> Result<()> {
        match self.schema_version()? {
            Some(stored) if !is_schema_compatible(stored) => Err(Error::Storage(format!(
                "Log schema v{} is not supported by this build (v{})",
                stored, SCHEMA_VERSION
            ))),
            Some(_) => Ok(()),
            None => {
                tracing::debug!(schema = SCHEMA_VERSION, "Initializing operation log");
                self.db
                    .put(SCHEMA_KEY, SCHEMA_VERSION.to_be_bytes())
                    .map_err(|e| Error::Storage(format!("Failed to write schema version: {}", e)))
            }
        }
    }

    /// Get a single operation by id
    pub fn get(&self, id: &OpId) -> Result<Option<Operation>> {
        match self.db.get(op_key(id)) {
            Ok(Some(value)) => Ok(Some(decode(&value)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to get op: {}", e))),
        }
    }

    /// Raw values of every key under `prefix`
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        let mut items = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| Error::Storage(format!("Iterator error: {}", e)))?;

            // Keys are sorted, so the first miss ends the prefix range
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key, value));
        }
        Ok(items)
    }
}

impl OperationStore for RocksStore {
    fn put_all(&self, operations: &[Operation], pending: bool) -> Result<()> {
        let mut batch = WriteBatch::default();
        for operation in operations {
            let value = operation
                .to_json()
                .map_err(|e| Error::Serialization(format!("Failed to encode op: {}", e)))?;
            batch.put(op_key(&operation.id), value);
            if pending {
                batch.put(pending_key(&operation.id), b"");
            }
        }

        self.db
            .write(batch)
            .map_err(|e| Error::Storage(format!("Failed to write ops: {}", e)))?;

        tracing::trace!(count = operations.len(), pending, "Stored operations");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Operation>> {
        self.scan(OP_PREFIX)?
            .into_iter()
            .map(|(_, value)| decode(&value))
            .collect()
    }

    fn pending(&self) -> Result<Vec<Operation>> {
        let mut operations = Vec::new();
        for (key, _) in self.scan(PENDING_PREFIX)? {
            let id = std::str::from_utf8(&key[PENDING_PREFIX.len()..])
                .map_err(|e| Error::Storage(format!("Corrupt pending key: {}", e)))?;
            match self.get(&OpId::from(id))? {
                Some(operation) => operations.push(operation),
                None => tracing::warn!(op_id = %id, "Pending marker without operation"),
            }
        }
        Ok(operations)
    }

    fn mark_synced(&self, ids: &[OpId]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for id in ids {
            batch.delete(pending_key(id));
        }

        self.db
            .write(batch)
            .map_err(|e| Error::Storage(format!("Failed to clear pending markers: {}", e)))
    }
}

// Key construction helpers
fn op_key(id: &OpId) -> Vec<u8> {
    let mut key = OP_PREFIX.to_vec();
    key.extend_from_slice(id.as_str().as_bytes());
    key
}

fn pending_key(id: &OpId) -> Vec<u8> {
    let mut key = PENDING_PREFIX.to_vec();
    key.extend_from_slice(id.as_str().as_bytes());
    key
}

fn decode(value: &[u8]) -> Result<Operation> {
    Operation::from_json(value)
        .map_err(|e| Error::Serialization(format!("Failed to decode op: {}", e)))
}
