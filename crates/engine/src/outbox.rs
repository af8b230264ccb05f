use std::sync::Arc;

use resync_core::{OpId, QueuedOperation, Record, RecordKey, Table};
use resync_storage::{LocalStore, StorageError};
use tracing::debug;

use crate::worker::WakeHandle;

/// Foreground entry point for writes: record optimistically, queue for
/// delivery, nudge the worker.
#[derive(Clone)]
pub struct Outbox {
    store: Arc<dyn LocalStore>,
    waker: Option<WakeHandle>,
}

impl Outbox {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store, waker: None }
    }

    pub fn with_waker(mut self, waker: WakeHandle) -> Self {
        self.waker = Some(waker);
        self
    }

    /// Store `record` locally and queue it for the remote. Returns the id of
    /// the queued operation. Does not touch the network.
    pub fn save(&self, table: Table, record: Record) -> Result<OpId, StorageError> {
        let op = QueuedOperation::new(table, record);
        let key = RecordKey::for_record(table, &op.payload, op.id);
        let op_id = self.store.write_and_enqueue(&[(key, op.payload.clone())], &op)?;
        debug!(%op_id, %table, create = op.is_create(), "write queued");

        if let Some(waker) = &self.waker {
            waker.wake();
        }
        Ok(op_id)
    }

    /// Latest local view of a record, including writes not yet delivered.
    pub fn read(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        self.store.get(key)
    }

    pub fn pending(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        self.store.list_all()
    }
}
