use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use resync_core::{OpId, QueuedOperation, Record, RecordKey, Table};

use crate::error::StorageError;
use crate::traits::{LocalStore, OperationQueue, RecordStore};

/// SQLite-backed store. One connection, guarded so every call runs as a
/// single-writer transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

type OpRow = (String, String, String, i64, u32, Option<String>);

fn read_op(row: OpRow) -> Result<QueuedOperation, StorageError> {
    let (op_id, table_name, payload, enqueued_at, attempts, last_error) = row;
    let payload: Record = serde_json::from_str(&payload)?;
    Ok(QueuedOperation {
        id: OpId::parse(&op_id)?,
        table: Table::parse(&table_name)?,
        payload,
        enqueued_at,
        attempts,
        last_error,
    })
}

fn upsert_records(conn: &Connection, records: &[(RecordKey, Record)]) -> Result<(), StorageError> {
    let mut stmt = conn.prepare(
        "INSERT INTO records (record_key, table_name, remote_id, body) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(record_key) DO UPDATE SET remote_id = excluded.remote_id, body = excluded.body,
         updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
    )?;
    for (key, record) in records {
        let body = serde_json::to_string(record)?;
        stmt.execute(params![
            key.encode(),
            key.table().as_str(),
            record.remote_id(),
            body
        ])?;
    }
    Ok(())
}

fn insert_op(conn: &Connection, op: &QueuedOperation) -> Result<OpId, StorageError> {
    let payload = serde_json::to_string(&op.payload)?;
    conn.execute(
        "INSERT INTO pending_ops (op_id, table_name, payload, enqueued_at, attempts, last_error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            op.id.to_string(),
            op.table.as_str(),
            payload,
            op.enqueued_at,
            op.attempts,
            op.last_error,
        ],
    )?;
    Ok(op.id)
}

impl RecordStore for SqliteStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE record_key = ?1",
                params![key.encode()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(StorageError::from))
            .transpose()
    }

    fn put_all(&self, records: &[(RecordKey, Record)]) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        upsert_records(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, key: &RecordKey) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM records WHERE record_key = ?1",
            params![key.encode()],
        )?;
        Ok(())
    }
}

impl OperationQueue for SqliteStore {
    fn enqueue(&self, op: &QueuedOperation) -> Result<OpId, StorageError> {
        let conn = self.conn.lock();
        insert_op(&conn, op)
    }

    fn list_all(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT op_id, table_name, payload, enqueued_at, attempts, last_error
             FROM pending_ops ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<OpRow>, _>>()?;
        rows.into_iter().map(read_op).collect()
    }

    fn remove(&self, op_id: OpId) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM pending_ops WHERE op_id = ?1",
            params![op_id.to_string()],
        )?;
        Ok(())
    }

    fn record_failure(&self, op_id: OpId, error: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE pending_ops SET attempts = attempts + 1, last_error = ?1 WHERE op_id = ?2",
            params![error, op_id.to_string()],
        )?;
        Ok(())
    }

    fn len(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_ops", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl LocalStore for SqliteStore {
    fn write_and_enqueue(
        &self,
        records: &[(RecordKey, Record)],
        op: &QueuedOperation,
    ) -> Result<OpId, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        upsert_records(&tx, records)?;
        let op_id = insert_op(&tx, op)?;
        tx.commit()?;
        Ok(op_id)
    }
}
