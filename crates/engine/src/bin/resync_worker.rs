//! Headless background worker.
//!
//! Reads newline-delimited JSON control messages from stdin, keeps the sync
//! worker running against the configured store, and logs anything a desktop
//! host would render.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use resync_core::{ControlMessage, NotificationOptions};
use resync_engine::{
    BackgroundRuntime, CredentialStore, EngineConfig, EngineError, ForegroundInstance,
    ForegroundRegistry, HostLifecycle, HttpGateway, NotificationDispatcher, NotificationSurface,
    SyncEngine, SyncWorker, control, logging,
};
use resync_storage::open_or_memory;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "resync-worker", about = "Offline write-sync background worker")]
struct Args {
    /// Config file (TOML). Defaults to the user config dir.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the store path from the config.
    #[arg(long)]
    db: Option<PathBuf>,
}

struct HeadlessHost;

#[async_trait]
impl HostLifecycle for HeadlessHost {
    async fn activate_now(&self) -> Result<(), EngineError> {
        info!("activate requested; headless host is always active");
        Ok(())
    }

    async fn deregister(&self) -> Result<bool, EngineError> {
        info!("deregistered");
        Ok(true)
    }
}

#[async_trait]
impl ForegroundRegistry for HeadlessHost {
    async fn instances(&self) -> Vec<Arc<dyn ForegroundInstance>> {
        Vec::new()
    }

    async fn open_instance(&self, url: &str) -> Result<Arc<dyn ForegroundInstance>, EngineError> {
        Err(EngineError::Host(format!("headless host cannot open {url}")))
    }
}

struct LogSurface;

#[async_trait]
impl NotificationSurface for LogSurface {
    async fn display(&self, options: &NotificationOptions) -> Result<(), String> {
        info!(title = %options.title, body = %options.body, target = %options.data.target, "notification");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("resync-worker");
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(EngineConfig::default_config_path);
    let mut config = if config_path.exists() {
        EngineConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no config file, using defaults");
        EngineConfig::default()
    };
    if let Some(db) = args.db {
        config.store.path = db;
    }

    if let Some(parent) = config.store.path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "cannot create store directory");
        }
    }
    let store_path = config.store.path.to_string_lossy().into_owned();
    let store = Arc::new(open_or_memory(&store_path).context("opening local store")?);

    let credentials = CredentialStore::new();
    let gateway = Arc::new(HttpGateway::new(
        credentials.clone(),
        config.sync.request_timeout(),
    ));
    let engine = Arc::new(SyncEngine::new(store, gateway));
    let worker = SyncWorker::spawn(engine, &config.sync);

    let host = Arc::new(HeadlessHost);
    let runtime = BackgroundRuntime::new(
        credentials,
        host.clone(),
        host,
        NotificationDispatcher::new(Arc::new(LogSurface), config.notifications.clone()),
        config.control.clone(),
    )
    .with_waker(worker.waker());

    let (sender, receiver) = control::channel(config.control.channel_buffer);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match ControlMessage::from_json(&line) {
                Ok(message) => {
                    if sender.send(message).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring malformed control message"),
            }
        }
    });

    runtime.run(receiver).await;
    reader.await.context("stdin reader")?;
    worker.shutdown().await;
    Ok(())
}
