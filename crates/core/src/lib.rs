pub mod control;
pub mod credentials;
pub mod error;
pub mod ids;
pub mod operations;
pub mod record;

pub use control::{ActionButton, ActionTag, ControlMessage, NotificationData, NotificationOptions, NotificationRequest};
pub use credentials::SyncCredentials;
pub use error::CoreError;
pub use ids::*;
pub use operations::{QueuedOperation, Table, now_ms};
pub use record::{Record, RecordKey};
