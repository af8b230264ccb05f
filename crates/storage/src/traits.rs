use resync_core::{OpId, QueuedOperation, Record, RecordKey};

use tracing::warn;

use crate::error::StorageError;

/// Entity records mirrored locally for optimistic reads.
///
/// Every call is a single atomic write (or read); implementations serialize
/// concurrent callers.
pub trait RecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError>;

    fn put_all(&self, records: &[(RecordKey, Record)]) -> Result<(), StorageError>;

    fn delete(&self, key: &RecordKey) -> Result<(), StorageError>;
}

/// Ordered queue of mutations awaiting remote confirmation.
pub trait OperationQueue {
    /// Append `op`. Never consults network state.
    fn enqueue(&self, op: &QueuedOperation) -> Result<OpId, StorageError>;

    /// Snapshot of every queued operation in insertion order.
    fn list_all(&self) -> Result<Vec<QueuedOperation>, StorageError>;

    /// Drop `op_id` from the queue. Removing an unknown id is a no-op.
    fn remove(&self, op_id: OpId) -> Result<(), StorageError>;

    /// Bump the attempt counter and remember the last failure. Unknown ids are ignored.
    fn record_failure(&self, op_id: OpId, error: &str) -> Result<(), StorageError>;

    fn len(&self) -> Result<usize, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

/// The one mutable resource shared between the foreground producer and the
/// background sync engine.
pub trait LocalStore: RecordStore + OperationQueue + Send + Sync {
    /// Write `records` and queue `op` as one unit: either both land or the
    /// records are put back the way they were.
    ///
    /// The default restores previous values by hand; backends with real
    /// transactions override it.
    fn write_and_enqueue(
        &self,
        records: &[(RecordKey, Record)],
        op: &QueuedOperation,
    ) -> Result<OpId, StorageError> {
        let previous = records
            .iter()
            .map(|(key, _)| Ok((key.clone(), self.get(key)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;
        self.put_all(records)?;

        match self.enqueue(op) {
            Ok(op_id) => Ok(op_id),
            Err(err) => {
                for (key, old) in previous {
                    let undo = match old {
                        Some(record) => self.put_all(&[(key.clone(), record)]),
                        None => self.delete(&key),
                    };
                    if let Err(e) = undo {
                        warn!(%key, error = %e, "cannot roll back optimistic write");
                    }
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use resync_core::Table;

    /// Memory store whose queue refuses every write, so only the default
    /// rollback path runs.
    struct FullQueue(MemoryStore);

    impl RecordStore for FullQueue {
        fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
            self.0.get(key)
        }

        fn put_all(&self, records: &[(RecordKey, Record)]) -> Result<(), StorageError> {
            self.0.put_all(records)
        }

        fn delete(&self, key: &RecordKey) -> Result<(), StorageError> {
            self.0.delete(key)
        }
    }

    impl OperationQueue for FullQueue {
        fn enqueue(&self, _op: &QueuedOperation) -> Result<OpId, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }

        fn list_all(&self) -> Result<Vec<QueuedOperation>, StorageError> {
            self.0.list_all()
        }

        fn remove(&self, op_id: OpId) -> Result<(), StorageError> {
            self.0.remove(op_id)
        }

        fn record_failure(&self, op_id: OpId, error: &str) -> Result<(), StorageError> {
            self.0.record_failure(op_id, error)
        }

        fn len(&self) -> Result<usize, StorageError> {
            self.0.len()
        }
    }

    impl LocalStore for FullQueue {}

    #[test]
    fn failed_enqueue_restores_records() {
        let store = FullQueue(MemoryStore::new());
        let existing = RecordKey::remote(Table::Bookings, 5);
        let server = Record::with_id(5).field("status", "pending");
        store.put_all(&[(existing.clone(), server.clone())]).unwrap();

        let update = QueuedOperation::new(Table::Bookings, Record::with_id(5).field("status", "approved"));
        let create = QueuedOperation::new(Table::Bookings, Record::new().field("room", "A1"));
        let placeholder = RecordKey::local(Table::Bookings, create.id);

        assert!(store
            .write_and_enqueue(&[(existing.clone(), update.payload.clone())], &update)
            .is_err());
        assert!(store
            .write_and_enqueue(&[(placeholder.clone(), create.payload.clone())], &create)
            .is_err());

        assert_eq!(store.get(&existing).unwrap(), Some(server));
        assert_eq!(store.get(&placeholder).unwrap(), None);
    }
}
