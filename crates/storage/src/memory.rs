use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use resync_core::{OpId, QueuedOperation, Record, RecordKey};

use crate::error::StorageError;
use crate::traits::{LocalStore, OperationQueue, RecordStore};

#[derive(Default)]
struct Inner {
    records: BTreeMap<RecordKey, Record>,
    queue: VecDeque<QueuedOperation>,
}

/// Volatile store with the same semantics as [`crate::SqliteStore`]. Used when
/// durable storage is unavailable.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, op_id: OpId) -> bool {
        self.inner.lock().queue.iter().any(|op| op.id == op_id)
    }
}

impl Inner {
    fn push(&mut self, op: &QueuedOperation) -> Result<OpId, StorageError> {
        if self.queue.iter().any(|queued| queued.id == op.id) {
            return Err(StorageError::ConstraintViolation(format!(
                "duplicate operation id {}",
                op.id
            )));
        }
        self.queue.push_back(op.clone());
        Ok(op.id)
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        Ok(self.inner.lock().records.get(key).cloned())
    }

    fn put_all(&self, records: &[(RecordKey, Record)]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        for (key, record) in records {
            inner.records.insert(key.clone(), record.clone());
        }
        Ok(())
    }

    fn delete(&self, key: &RecordKey) -> Result<(), StorageError> {
        self.inner.lock().records.remove(key);
        Ok(())
    }
}

impl OperationQueue for MemoryStore {
    fn enqueue(&self, op: &QueuedOperation) -> Result<OpId, StorageError> {
        self.inner.lock().push(op)
    }

    fn list_all(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        Ok(self.inner.lock().queue.iter().cloned().collect())
    }

    fn remove(&self, op_id: OpId) -> Result<(), StorageError> {
        self.inner.lock().queue.retain(|op| op.id != op_id);
        Ok(())
    }

    fn record_failure(&self, op_id: OpId, error: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if let Some(op) = inner.queue.iter_mut().find(|op| op.id == op_id) {
            op.attempts += 1;
            op.last_error = Some(error.to_string());
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.inner.lock().queue.len())
    }
}

impl LocalStore for MemoryStore {
    fn write_and_enqueue(
        &self,
        records: &[(RecordKey, Record)],
        op: &QueuedOperation,
    ) -> Result<OpId, StorageError> {
        let mut inner = self.inner.lock();
        let op_id = inner.push(op)?;
        for (key, record) in records {
            inner.records.insert(key.clone(), record.clone());
        }
        Ok(op_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resync_core::Table;

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let store = MemoryStore::new();
        store
            .enqueue(&QueuedOperation::new(Table::Bookings, Record::new()))
            .unwrap();
        let snapshot = store.list_all().unwrap();
        store
            .enqueue(&QueuedOperation::new(Table::Bookings, Record::new()))
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn remove_twice_is_noop() {
        let store = MemoryStore::new();
        let id = store
            .enqueue(&QueuedOperation::new(Table::Facilities, Record::with_id(1)))
            .unwrap();
        store.remove(id).unwrap();
        store.remove(id).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn duplicate_enqueue_rejected() {
        let store = MemoryStore::new();
        let op = QueuedOperation::new(Table::Bookings, Record::new());
        store.enqueue(&op).unwrap();
        let err = store.enqueue(&op).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)), "got {err:?}");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn write_and_enqueue_is_all_or_nothing() {
        let store = MemoryStore::new();
        let op = QueuedOperation::new(Table::Bookings, Record::new().field("room", "A1"));
        store.enqueue(&op).unwrap();

        let key = RecordKey::local(Table::Bookings, op.id);
        assert!(store.write_and_enqueue(&[(key.clone(), op.payload.clone())], &op).is_err());
        assert_eq!(store.get(&key).unwrap(), None);
        assert!(store.contains(op.id));
    }
}
