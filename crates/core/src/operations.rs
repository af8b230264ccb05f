use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CoreError;
use crate::ids::OpId;
use crate::record::Record;

/// Remote resource collections the client writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Bookings,
    Facilities,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Bookings, Table::Facilities];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bookings => "bookings",
            Self::Facilities => "facilities",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "bookings" => Ok(Self::Bookings),
            "facilities" => Ok(Self::Facilities),
            _ => Err(CoreError::InvalidData(format!("unknown table: {s}"))),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation recorded locally that the remote system has not yet confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OpId,
    pub table: Table,
    pub payload: Record,
    /// Unix milliseconds.
    pub enqueued_at: i64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueuedOperation {
    pub fn new(table: Table, payload: Record) -> Self {
        Self {
            id: OpId::new(),
            table,
            payload,
            enqueued_at: now_ms(),
            attempts: 0,
            last_error: None,
        }
    }

    /// True when delivering this operation creates a new remote row.
    pub fn is_create(&self) -> bool {
        self.payload.remote_id().is_none()
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
