use std::fs::OpenOptions;

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive variable, e.g. `RESYNC_LOG=resync_engine=debug`.
pub const LOG_FILTER_ENV: &str = "RESYNC_LOG";
/// When set, logs are also appended to this file.
pub const LOG_FILE_ENV: &str = "RESYNC_LOG_FILE";

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_layer = std::env::var(LOG_FILE_ENV).ok().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
            ),
            Err(e) => {
                eprintln!("cannot open log file {path}: {e}");
                None
            }
        }
    });

    if registry.with(file_layer).try_init().is_ok() {
        tracing::info!(service = service_name, "tracing initialized");
    }
}
