//! Seams to the process hosting the background runtime.

use std::sync::Arc;

use async_trait::async_trait;
use resync_core::InstanceId;

use crate::error::EngineError;

/// Lifecycle hooks of the background runtime itself.
#[async_trait]
pub trait HostLifecycle: Send + Sync {
    /// Make the newly installed version active now, taking over every
    /// foreground instance from the version currently serving them.
    async fn activate_now(&self) -> Result<(), EngineError>;

    /// Remove the background runtime's registration with the host.
    async fn deregister(&self) -> Result<bool, EngineError>;
}

/// One open foreground instance (window, tab).
#[async_trait]
pub trait ForegroundInstance: Send + Sync {
    fn id(&self) -> InstanceId;

    /// Navigate to `url`; resolves once the instance acknowledges.
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    async fn focus(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait ForegroundRegistry: Send + Sync {
    async fn instances(&self) -> Vec<Arc<dyn ForegroundInstance>>;

    /// Open a new instance at `url`.
    async fn open_instance(&self, url: &str) -> Result<Arc<dyn ForegroundInstance>, EngineError>;
}
