use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use resync_core::NotificationOptions;
use resync_engine::NotificationSurface;

/// Notification surface that remembers what it was asked to draw.
#[derive(Default)]
pub struct TestSurface {
    shown: Mutex<Vec<NotificationOptions>>,
    failing: AtomicBool,
}

impl TestSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let surface = Self::default();
        surface.failing.store(true, Ordering::Release);
        surface
    }

    pub fn shown(&self) -> Vec<NotificationOptions> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl NotificationSurface for TestSurface {
    async fn display(&self, options: &NotificationOptions) -> Result<(), String> {
        if self.failing.load(Ordering::Acquire) {
            return Err("notification permission not granted".into());
        }
        self.shown.lock().push(options.clone());
        Ok(())
    }
}
