use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use resync_core::{OpId, QueuedOperation, Record, RecordKey};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::traits::{LocalStore, OperationQueue, RecordStore};

/// Wraps a durable store and falls back to memory-only operation the first
/// time the durable store reports itself unavailable. Once degraded it stays
/// degraded for the life of the process.
///
/// On degrading, whatever the durable queue still lets us read is carried
/// into memory so queued writes keep draining. Operations removed from the
/// memory queue are remembered and removed from the durable queue as soon as
/// it accepts writes again, so a restart does not resend them.
pub struct ResilientStore {
    primary: Option<Box<dyn LocalStore>>,
    fallback: MemoryStore,
    degraded: AtomicBool,
    degrading: Mutex<()>,
    tombstones: Mutex<BTreeSet<OpId>>,
}

impl ResilientStore {
    pub fn new(primary: Box<dyn LocalStore>) -> Self {
        Self {
            primary: Some(primary),
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(false),
            degrading: Mutex::new(()),
            tombstones: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn memory_only() -> Self {
        Self {
            primary: None,
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(true),
            degrading: Mutex::new(()),
            tombstones: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Removed operations whose durable copy could not be deleted yet.
    pub fn pending_removals(&self) -> Vec<OpId> {
        self.tombstones.lock().iter().copied().collect()
    }

    fn with<T>(
        &self,
        call: &str,
        f: impl Fn(&dyn LocalStore) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let Some(primary) = self.primary.as_deref() else {
            return f(&self.fallback);
        };
        if self.is_degraded() {
            self.flush_removals(primary);
            return f(&self.fallback);
        }
        match f(primary) {
            Err(err) if err.is_unavailable() => {
                self.degrade(primary, call, &err);
                f(&self.fallback)
            }
            other => other,
        }
    }

    fn degrade(&self, primary: &dyn LocalStore, call: &str, err: &StorageError) {
        let _guard = self.degrading.lock();
        if self.is_degraded() {
            return;
        }
        warn!(call, error = %err, "durable store unavailable, continuing in memory only");

        match primary.list_all() {
            Ok(ops) => {
                let carried = ops
                    .iter()
                    .filter(|op| self.fallback.enqueue(op).is_ok())
                    .count();
                info!(carried, "carried durable queue into memory");
            }
            Err(e) => {
                warn!(error = %e, "durable queue unreadable, its operations resume after restart");
            }
        }
        self.degraded.store(true, Ordering::Release);
    }

    fn flush_removals(&self, primary: &dyn LocalStore) {
        let mut tombstones = self.tombstones.lock();
        if tombstones.is_empty() {
            return;
        }
        tombstones.retain(|op_id| primary.remove(*op_id).is_err());
        if tombstones.is_empty() {
            info!("durable queue caught up with removals made in memory");
        }
    }

    /// Queue bookkeeping while degraded. Operations held in memory are updated
    /// there; anything else only exists durably, so the durable store has to
    /// take the call and its error is surfaced.
    fn degraded_queue_call(
        &self,
        op_id: OpId,
        in_memory: impl FnOnce() -> Result<(), StorageError>,
        durable: impl FnOnce() -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        if self.fallback.contains(op_id) {
            return in_memory();
        }
        durable()?;
        debug!(%op_id, "queue call served by durable store while degraded");
        Ok(())
    }
}

impl RecordStore for ResilientStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        self.with("get", |s| s.get(key))
    }

    fn put_all(&self, records: &[(RecordKey, Record)]) -> Result<(), StorageError> {
        self.with("put_all", |s| s.put_all(records))
    }

    fn delete(&self, key: &RecordKey) -> Result<(), StorageError> {
        self.with("delete", |s| s.delete(key))
    }
}

impl OperationQueue for ResilientStore {
    fn enqueue(&self, op: &QueuedOperation) -> Result<OpId, StorageError> {
        self.with("enqueue", |s| s.enqueue(op))
    }

    fn list_all(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        self.with("list_all", |s| s.list_all())
    }

    fn remove(&self, op_id: OpId) -> Result<(), StorageError> {
        let Some(primary) = self.primary.as_deref() else {
            return self.fallback.remove(op_id);
        };
        if !self.is_degraded() {
            match primary.remove(op_id) {
                Err(err) if err.is_unavailable() => self.degrade(primary, "remove", &err),
                other => return other,
            }
        }
        if self.tombstones.lock().contains(&op_id) {
            return Ok(());
        }
        self.degraded_queue_call(
            op_id,
            || {
                self.fallback.remove(op_id)?;
                self.tombstones.lock().insert(op_id);
                self.flush_removals(primary);
                Ok(())
            },
            || primary.remove(op_id),
        )
    }

    fn record_failure(&self, op_id: OpId, error: &str) -> Result<(), StorageError> {
        let Some(primary) = self.primary.as_deref() else {
            return self.fallback.record_failure(op_id, error);
        };
        if !self.is_degraded() {
            match primary.record_failure(op_id, error) {
                Err(err) if err.is_unavailable() => {
                    self.degrade(primary, "record_failure", &err)
                }
                other => return other,
            }
        }
        self.degraded_queue_call(
            op_id,
            || self.fallback.record_failure(op_id, error),
            || primary.record_failure(op_id, error),
        )
    }

    fn len(&self) -> Result<usize, StorageError> {
        self.with("len", |s| s.len())
    }
}

impl LocalStore for ResilientStore {
    fn write_and_enqueue(
        &self,
        records: &[(RecordKey, Record)],
        op: &QueuedOperation,
    ) -> Result<OpId, StorageError> {
        self.with("write_and_enqueue", |s| s.write_and_enqueue(records, op))
    }
}

/// Open the SQLite store at `path`, degrading to memory-only when the file
/// cannot be opened. Other errors (corrupt schema, bad data) still surface.
pub fn open_or_memory(path: &str) -> Result<ResilientStore, StorageError> {
    match SqliteStore::open(path) {
        Ok(store) => {
            info!(path, "opened durable store");
            Ok(ResilientStore::new(Box::new(store)))
        }
        Err(err) if err.is_unavailable() => {
            warn!(path, error = %err, "durable store unavailable at startup, using memory only");
            Ok(ResilientStore::memory_only())
        }
        Err(err) => Err(err),
    }
}
