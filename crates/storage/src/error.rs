use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A write collided with existing data, such as a duplicate operation id.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Persistence is inaccessible (cannot open, disk full, read-only, locked).
    /// Callers degrade to memory-only operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("core error: {0}")]
    Core(#[from] resync_core::CoreError),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    ErrorCode::CannotOpen
                        | ErrorCode::DiskFull
                        | ErrorCode::ReadOnly
                        | ErrorCode::SystemIoFailure
                        | ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::PermissionDenied
                        | ErrorCode::NotADatabase
                ) =>
            {
                Self::Unavailable(e.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                Self::ConstraintViolation(e.to_string())
            }
            _ => Self::Sqlite(e),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
