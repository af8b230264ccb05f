use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use resync_core::{OpId, QueuedOperation, Record, RecordKey};
use resync_storage::{LocalStore, OperationQueue, RecordStore, SqliteStore, StorageError};

/// Shared switch for a [`FlakyStore`] that has been moved into a wrapper.
#[derive(Clone, Default)]
pub struct DiskSwitch {
    removes_down: Arc<AtomicBool>,
}

impl DiskSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_removes(&self, down: bool) {
        self.removes_down.store(down, Ordering::Release);
    }

    fn removes_down(&self) -> bool {
        self.removes_down.load(Ordering::Acquire)
    }
}

/// SQLite store whose queue deletes can be made to fail as if the disk had
/// gone away.
pub struct FlakyStore {
    inner: SqliteStore,
    switch: DiskSwitch,
}

impl FlakyStore {
    pub fn open(path: &str, switch: DiskSwitch) -> Result<Self, StorageError> {
        Ok(Self {
            inner: SqliteStore::open(path)?,
            switch,
        })
    }
}

impl RecordStore for FlakyStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        self.inner.get(key)
    }

    fn put_all(&self, records: &[(RecordKey, Record)]) -> Result<(), StorageError> {
        self.inner.put_all(records)
    }

    fn delete(&self, key: &RecordKey) -> Result<(), StorageError> {
        self.inner.delete(key)
    }
}

impl OperationQueue for FlakyStore {
    fn enqueue(&self, op: &QueuedOperation) -> Result<OpId, StorageError> {
        self.inner.enqueue(op)
    }

    fn list_all(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        self.inner.list_all()
    }

    fn remove(&self, op_id: OpId) -> Result<(), StorageError> {
        if self.switch.removes_down() {
            return Err(StorageError::Unavailable("disk I/O error".into()));
        }
        self.inner.remove(op_id)
    }

    fn record_failure(&self, op_id: OpId, error: &str) -> Result<(), StorageError> {
        self.inner.record_failure(op_id, error)
    }

    fn len(&self) -> Result<usize, StorageError> {
        self.inner.len()
    }
}

impl LocalStore for FlakyStore {
    fn write_and_enqueue(
        &self,
        records: &[(RecordKey, Record)],
        op: &QueuedOperation,
    ) -> Result<OpId, StorageError> {
        self.inner.write_and_enqueue(records, op)
    }
}
