use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use resync_core::{ActionButton, ActionTag, NotificationData, NotificationOptions, NotificationRequest};
use tracing::{error, info};

use crate::config::NotificationConfig;

/// Host surface that actually draws notifications.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    async fn display(&self, options: &NotificationOptions) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOutcome {
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl DisplayOutcome {
    pub fn is_shown(&self) -> bool {
        self.error.is_none()
    }
}

pub struct NotificationDispatcher {
    surface: Arc<dyn NotificationSurface>,
    config: NotificationConfig,
}

impl NotificationDispatcher {
    pub fn new(surface: Arc<dyn NotificationSurface>, config: NotificationConfig) -> Self {
        Self { surface, config }
    }

    pub fn options_for(&self, request: &NotificationRequest) -> NotificationOptions {
        NotificationOptions {
            title: request.title.clone(),
            body: request.body.clone(),
            icon: self.config.icon.clone(),
            badge: self.config.badge.clone(),
            vibrate: self.config.vibrate.clone(),
            tag: request.tag.clone(),
            data: NotificationData {
                target: request.routing_target(),
            },
            actions: vec![
                ActionButton {
                    action: ActionTag::Primary,
                    title: self.config.primary_label.clone(),
                },
                ActionButton {
                    action: ActionTag::Dismiss,
                    title: self.config.dismiss_label.clone(),
                },
            ],
        }
    }

    /// Render `request`. Failures are logged and reported, never returned as errors.
    pub async fn show(&self, request: &NotificationRequest) -> DisplayOutcome {
        let options = self.options_for(request);
        let started = Instant::now();
        let result = self.surface.display(&options).await;
        let elapsed = started.elapsed();

        match result {
            Ok(()) => {
                info!(
                    title = %options.title,
                    target = %options.data.target,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "notification shown"
                );
                DisplayOutcome {
                    elapsed,
                    error: None,
                }
            }
            Err(e) => {
                error!(
                    title = %options.title,
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "notification failed"
                );
                DisplayOutcome {
                    elapsed,
                    error: Some(e),
                }
            }
        }
    }
}
