//! WorkerRegistry — redb-backed persistence for worker registrations.
//!
//! Upsert, lookup, enumeration, and removal of `WorkerRecord`s. Records
//! are JSON-serialized into the `workers` table. The registry supports both
//! on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::WORKERS;
use crate::types::WorkerRecord;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe worker registry backed by redb.
#[derive(Clone)]
pub struct WorkerRegistry {
    db: Arc<Database>,
}

impl WorkerRegistry {
    /// Open (or create) a persistent registry at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let registry = Self { db: Arc::new(db) };
        registry.ensure_tables()?;
        debug!(?path, "worker registry opened");
        Ok(registry)
    }

    /// Create an ephemeral in-memory registry (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let registry = Self { db: Arc::new(db) };
        registry.ensure_tables()?;
        debug!("in-memory worker registry opened");
        Ok(registry)
    }

    /// Create the `workers` table if it doesn't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(WORKERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or overwrite a worker registration.
    ///
    /// The write is committed before this returns. Returns `true` if the
    /// `worker_id` was not registered before.
    pub fn register(&self, record: &WorkerRecord) -> StoreResult<bool> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created;
        {
            let mut table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
            created = table
                .insert(record.worker_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?
                .is_none();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(worker_id = %record.worker_id, address = %record.address, created, "worker stored");
        Ok(created)
    }

    /// Get a single worker by ID.
    pub fn get(&self, worker_id: &str) -> StoreResult<Option<WorkerRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
        match table.get(worker_id).map_err(map_err!(Read))? {
            Some(guard) => decode(worker_id, guard.value()).map(Some),
            None => Ok(None),
        }
    }

    /// List every registered worker.
    ///
    /// Reads happen inside a single read transaction, so the result is a
    /// consistent snapshot. Records come back in key order.
    pub fn list_all(&self) -> StoreResult<Vec<WorkerRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(key.value(), value.value())?);
        }
        Ok(results)
    }

    /// Remove a worker by ID. Returns true if it existed.
    pub fn deregister(&self, worker_id: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
            existed = table.remove(worker_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%worker_id, existed, "worker removed");
        Ok(existed)
    }

    /// Remove a worker only if its stored record still equals `expected`.
    ///
    /// The read and the removal share one write transaction, so a
    /// re-registration under the same id (e.g. at a new address) is never
    /// deleted on the strength of an older record. Returns true if removed.
    pub fn deregister_if(&self, expected: &WorkerRecord) -> StoreResult<bool> {
        let worker_id = expected.worker_id.as_str();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
            let current = match table.get(worker_id).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(worker_id, guard.value())?),
                None => None,
            };
            removed = current.as_ref() == Some(expected);
            if removed {
                table.remove(worker_id).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%worker_id, removed, "conditional worker removal");
        Ok(removed)
    }
}

fn decode(worker_id: &str, bytes: &[u8]) -> StoreResult<WorkerRecord> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        worker_id: worker_id.to_string(),
        reason: e.to_string(),
    })
}
