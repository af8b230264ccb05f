pub mod error;
pub mod memory;
pub mod resilient;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use resilient::{ResilientStore, open_or_memory};
pub use sqlite::SqliteStore;
pub use traits::*;
