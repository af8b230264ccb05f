use resync_core::CoreError;
use resync_storage::StorageError;
use thiserror::Error;

/// Outcome of delivering one queued operation. Every variant leaves the
/// operation queued; none of them is fatal to the background runtime.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync credentials are not set")]
    CredentialsMissing,

    #[error("remote unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out")]
    TimeoutExceeded,

    #[error("remote rejected request with status {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// True when the remaining operations of the cycle cannot succeed either.
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            Self::CredentialsMissing | Self::NetworkUnreachable(_) | Self::TimeoutExceeded
        )
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("host error: {0}")]
    Host(String),

    #[error("control channel closed")]
    ChannelClosed,
}
