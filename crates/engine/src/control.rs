//! Control channel between foreground instances and the background runtime.
//!
//! Messages are processed one at a time by [`BackgroundRuntime::run`]; each
//! kind has exactly one handler and no handler error escapes the loop.

use std::sync::Arc;

use resync_core::{ActionTag, ControlMessage, InstanceId, SyncCredentials};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ControlConfig;
use crate::credentials::CredentialStore;
use crate::error::EngineError;
use crate::host::{ForegroundRegistry, HostLifecycle};
use crate::notify::{DisplayOutcome, NotificationDispatcher};
use crate::terminate::{TerminationReport, terminate_all};
use crate::worker::WakeHandle;

#[derive(Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlSender {
    pub async fn send(&self, message: ControlMessage) -> Result<(), EngineError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

pub struct ControlReceiver {
    rx: mpsc::Receiver<ControlMessage>,
}

pub fn channel(buffer: usize) -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ControlSender { tx }, ControlReceiver { rx })
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Focused(InstanceId),
    Opened(InstanceId),
    Ignored,
}

/// What the runtime did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Activated,
    CredentialsStored,
    Terminated(TerminationReport),
    Notified(DisplayOutcome),
    Routed(RouteOutcome),
    Failed { kind: &'static str, error: String },
}

pub struct BackgroundRuntime {
    credentials: CredentialStore,
    lifecycle: Arc<dyn HostLifecycle>,
    registry: Arc<dyn ForegroundRegistry>,
    notifications: NotificationDispatcher,
    config: ControlConfig,
    waker: Option<WakeHandle>,
}

impl BackgroundRuntime {
    pub fn new(
        credentials: CredentialStore,
        lifecycle: Arc<dyn HostLifecycle>,
        registry: Arc<dyn ForegroundRegistry>,
        notifications: NotificationDispatcher,
        config: ControlConfig,
    ) -> Self {
        Self {
            credentials,
            lifecycle,
            registry,
            notifications,
            config,
            waker: None,
        }
    }

    /// Wake the sync worker whenever fresh credentials arrive.
    pub fn with_waker(mut self, waker: WakeHandle) -> Self {
        self.waker = Some(waker);
        self
    }

    /// Process messages until every sender is dropped. Returns the number of
    /// messages handled.
    pub async fn run(&self, mut receiver: ControlReceiver) -> usize {
        let mut handled = 0;
        while let Some(message) = receiver.rx.recv().await {
            let kind = message.kind();
            debug!(kind, "control message received");
            if let Handled::Failed { kind, error } = self.handle(message).await {
                error!(kind, %error, "control message failed");
            }
            handled += 1;
        }
        info!(handled, "control channel closed");
        handled
    }

    pub async fn handle(&self, message: ControlMessage) -> Handled {
        let kind = message.kind();
        let result = match message {
            ControlMessage::ActivateNow => self.activate().await,
            ControlMessage::CredentialsUpdate { endpoint, key } => {
                self.store_credentials(&endpoint, key)
            }
            ControlMessage::TerminateApp => Ok(self.terminate().await),
            ControlMessage::ShowNotification(request) => {
                Ok(Handled::Notified(self.notifications.show(&request).await))
            }
            ControlMessage::NotificationAction { action, target } => {
                self.route(action, target).await.map(Handled::Routed)
            }
        };
        result.unwrap_or_else(|e| Handled::Failed {
            kind,
            error: e.to_string(),
        })
    }

    async fn activate(&self) -> Result<Handled, EngineError> {
        self.lifecycle.activate_now().await?;
        info!("new version activated");
        Ok(Handled::Activated)
    }

    fn store_credentials(&self, endpoint: &str, key: String) -> Result<Handled, EngineError> {
        let credentials = SyncCredentials::new(endpoint, key)?;
        info!(endpoint = %credentials.endpoint, "sync credentials updated");
        self.credentials.set(credentials);
        if let Some(waker) = &self.waker {
            waker.wake();
        }
        Ok(Handled::CredentialsStored)
    }

    /// Session teardown: blank the foreground, deregister, forget credentials.
    async fn terminate(&self) -> Handled {
        let report = terminate_all(
            self.registry.as_ref(),
            self.lifecycle.as_ref(),
            &self.config.neutral_url,
            self.config.terminate_timeout(),
        )
        .await;
        self.credentials.clear();
        Handled::Terminated(report)
    }

    async fn route(
        &self,
        action: ActionTag,
        target: Option<String>,
    ) -> Result<RouteOutcome, EngineError> {
        match action {
            ActionTag::Dismiss => {
                debug!("notification dismissed");
                Ok(RouteOutcome::Ignored)
            }
            ActionTag::Primary => {
                let instances = self.registry.instances().await;
                if let Some(instance) = instances.first() {
                    if let Some(target) = target.as_deref() {
                        instance.navigate(target).await?;
                    }
                    instance.focus().await?;
                    return Ok(RouteOutcome::Focused(instance.id()));
                }
                let url = target.as_deref().unwrap_or("/");
                match self.registry.open_instance(url).await {
                    Ok(instance) => Ok(RouteOutcome::Opened(instance.id())),
                    Err(e) => {
                        warn!(url, error = %e, "cannot open foreground instance");
                        Err(e)
                    }
                }
            }
        }
    }
}
