use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::CoreError;
use crate::ids::OpId;
use crate::operations::Table;

/// A domain entity as exchanged with the remote API.
///
/// `id` is the server-assigned identifier. A missing or non-positive id means
/// the entity has not been created upstream yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(id),
            fields: Map::new(),
        }
    }

    pub fn from_json(value: Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The upstream identifier, if the entity already exists remotely.
    pub fn remote_id(&self) -> Option<i64> {
        self.id.filter(|id| *id > 0)
    }

    /// Request body with the identifier stripped. Creates let the server
    /// assign the id; updates address the row through the URL.
    pub fn body(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Key of a record in the local store: the server id once known, otherwise a
/// placeholder minted when the write was queued.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    Remote { table: Table, id: i64 },
    Local { table: Table, placeholder: String },
}

impl RecordKey {
    pub fn remote(table: Table, id: i64) -> Self {
        Self::Remote { table, id }
    }

    pub fn local(table: Table, op_id: OpId) -> Self {
        Self::Local {
            table,
            placeholder: op_id.to_string(),
        }
    }

    /// Key under which an optimistic write of `record` is stored.
    pub fn for_record(table: Table, record: &Record, op_id: OpId) -> Self {
        match record.remote_id() {
            Some(id) => Self::remote(table, id),
            None => Self::local(table, op_id),
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Self::Remote { table, .. } | Self::Local { table, .. } => *table,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let (table, rest) = s
            .split_once('/')
            .ok_or_else(|| CoreError::InvalidData(format!("malformed record key: {s}")))?;
        let table = Table::parse(table)?;
        if let Some(placeholder) = rest.strip_prefix("local:") {
            return Ok(Self::Local {
                table,
                placeholder: placeholder.to_string(),
            });
        }
        let id = rest
            .parse::<i64>()
            .map_err(|_| CoreError::InvalidData(format!("malformed record key: {s}")))?;
        Ok(Self::Remote { table, id })
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { table, id } => write!(f, "{table}/{id}"),
            Self::Local { table, placeholder } => write!(f, "{table}/local:{placeholder}"),
        }
    }
}
