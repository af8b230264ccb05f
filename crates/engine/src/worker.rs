//! Wake-up driver for the sync engine.
//!
//! Drains are spawned per wake-up and coalesce on the engine's lane flags.
//! The periodic interval doubles after cycles that could not reach the
//! remote and snaps back once something is delivered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::sync::{DrainReport, SyncEngine};

/// Cloneable trigger for an immediate drain.
#[derive(Clone, Default)]
pub struct WakeHandle {
    notify: Arc<Notify>,
}

impl WakeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

pub struct WorkerHandle {
    waker: WakeHandle,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn wake(&self) {
        self.waker.wake();
    }

    pub fn waker(&self) -> WakeHandle {
        self.waker.clone()
    }

    /// Stop scheduling drains and wait for in-flight ones to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "sync worker task failed");
        }
    }
}

pub struct SyncWorker;

impl SyncWorker {
    pub fn spawn(engine: Arc<SyncEngine>, config: &SyncConfig) -> WorkerHandle {
        Self::spawn_with(engine, config, WakeHandle::new())
    }

    /// Spawn using an existing wake handle, so producers created earlier can
    /// already hold it.
    pub fn spawn_with(engine: Arc<SyncEngine>, config: &SyncConfig, waker: WakeHandle) -> WorkerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let backoff = Backoff::new(config.interval(), config.max_backoff());
        let task = tokio::spawn(run(engine, waker.clone(), shutdown_rx, backoff));
        WorkerHandle {
            waker,
            shutdown,
            task,
        }
    }
}

async fn run(
    engine: Arc<SyncEngine>,
    waker: WakeHandle,
    mut shutdown: watch::Receiver<bool>,
    mut backoff: Backoff,
) {
    let mut drains: JoinSet<DrainReport> = JoinSet::new();
    let timer = tokio::time::sleep(backoff.current());
    tokio::pin!(timer);
    info!(interval_secs = backoff.current().as_secs(), "sync worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = waker.notified() => {
                debug!("wake-up received");
                let engine = engine.clone();
                drains.spawn(async move { engine.drain().await });
            }
            _ = &mut timer => {
                let engine = engine.clone();
                drains.spawn(async move { engine.drain().await });
                timer.as_mut().reset(Instant::now() + backoff.current());
            }
            Some(joined) = drains.join_next() => match joined {
                Ok(report) => {
                    let before = backoff.current();
                    backoff.observe(&report);
                    if backoff.current() != before {
                        debug!(next_secs = backoff.current().as_secs(), "sync interval adjusted");
                        timer.as_mut().reset(Instant::now() + backoff.current());
                    }
                }
                Err(e) => error!(error = %e, "drain task panicked"),
            },
        }
    }

    while let Some(joined) = drains.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "drain task panicked");
        }
    }
    info!("sync worker stopped");
}

#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    pub(crate) fn current(&self) -> Duration {
        self.current
    }

    pub(crate) fn observe(&mut self, report: &DrainReport) {
        if !report.delivered.is_empty() {
            self.current = self.base;
        } else if report.aborted.is_some() {
            self.current = (self.current * 2).min(self.max);
        } else if !report.fully_coalesced() {
            self.current = self.base;
        }
    }
}
