pub mod config;
pub mod control;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod host;
pub mod logging;
pub mod notify;
pub mod outbox;
pub mod sync;
pub mod terminate;
pub mod worker;

pub use config::EngineConfig;
pub use control::{BackgroundRuntime, ControlReceiver, ControlSender, Handled, RouteOutcome};
pub use credentials::CredentialStore;
pub use error::{EngineError, SyncError};
pub use gateway::{GatewayRequest, HttpGateway, RemoteGateway};
pub use host::{ForegroundInstance, ForegroundRegistry, HostLifecycle};
pub use notify::{DisplayOutcome, NotificationDispatcher, NotificationSurface};
pub use outbox::Outbox;
pub use sync::{DrainReport, EngineState, SyncEngine};
pub use terminate::{TerminationReport, terminate_all};
pub use worker::{SyncWorker, WakeHandle, WorkerHandle};
