use std::sync::Arc;

use parking_lot::RwLock;
use resync_core::SyncCredentials;

/// Shared handle to the session's sync credentials.
///
/// Handed to the gateway and the control runtime at construction. Updates are
/// last-write-wins; readers always see a complete value or nothing.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<SyncCredentials>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: SyncCredentials) -> Self {
        let store = Self::new();
        store.set(credentials);
        store
    }

    pub fn set(&self, credentials: SyncCredentials) {
        *self.inner.write() = Some(credentials);
    }

    pub fn get(&self) -> Option<SyncCredentials> {
        self.inner.read().clone()
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }
}
