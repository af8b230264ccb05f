use std::sync::Arc;

use resync_core::{OpId, Record, Table};
use resync_engine::{DrainReport, Outbox, SyncEngine};
use resync_storage::{LocalStore, SqliteStore, StorageError};

use crate::remote::StubGateway;

/// A foreground producer and a background engine sharing one in-memory
/// SQLite store, wired to a stub remote.
pub struct TestClient {
    pub store: Arc<SqliteStore>,
    pub gateway: Arc<StubGateway>,
    pub engine: Arc<SyncEngine>,
    pub outbox: Outbox,
}

impl TestClient {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_gateway(StubGateway::succeeding())
    }

    pub fn with_gateway(gateway: Arc<StubGateway>) -> Result<Self, StorageError> {
        let store = Arc::new(SqliteStore::open_in_memory()?);
        let shared: Arc<dyn LocalStore> = store.clone();
        let engine = Arc::new(SyncEngine::new(shared.clone(), gateway.clone()));
        Ok(Self {
            store,
            gateway,
            engine,
            outbox: Outbox::new(shared),
        })
    }

    /// Queue a new booking for `room`.
    pub fn book(&self, room: &str) -> Result<OpId, StorageError> {
        self.outbox.save(
            Table::Bookings,
            Record::new().field("room", room).field("status", "pending"),
        )
    }

    /// Queue a status change for an existing booking.
    pub fn set_status(&self, booking_id: i64, status: &str) -> Result<OpId, StorageError> {
        self.outbox.save(
            Table::Bookings,
            Record::with_id(booking_id).field("status", status),
        )
    }

    /// Queue a new facility.
    pub fn add_facility(&self, name: &str) -> Result<OpId, StorageError> {
        self.outbox
            .save(Table::Facilities, Record::new().field("name", name))
    }

    pub fn pending_ids(&self) -> Result<Vec<OpId>, StorageError> {
        Ok(self.outbox.pending()?.into_iter().map(|op| op.id).collect())
    }

    pub async fn drain(&self) -> DrainReport {
        self.engine.drain().await
    }
}
