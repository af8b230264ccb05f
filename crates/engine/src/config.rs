//! Runtime configuration for the background sync worker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;

/// Top-level configuration, loaded from TOML. Every section falls back to
/// defaults for missing fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub control: ControlConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file holding records and the pending queue.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self {
            path: base.join("resync").join("resync.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Periodic wake-up interval.
    pub interval_secs: u64,
    /// Upper bound for the interval after consecutive unreachable cycles.
    pub max_backoff_secs: u64,
    /// Per-request timeout for the remote gateway.
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_backoff_secs: 300,
            request_timeout_secs: 15,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs.max(self.interval_secs.max(1)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// How long each foreground instance gets to acknowledge a terminate.
    pub terminate_timeout_ms: u64,
    /// Route every instance is sent to on terminate.
    pub neutral_url: String,
    pub channel_buffer: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            terminate_timeout_ms: 3_000,
            neutral_url: "about:blank".to_string(),
            channel_buffer: 64,
        }
    }
}

impl ControlConfig {
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub icon: Option<String>,
    pub badge: Option<String>,
    /// Vibration pattern in milliseconds (on, off, on, ...).
    pub vibrate: Vec<u32>,
    pub primary_label: String,
    pub dismiss_label: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            icon: Some("/icons/icon-192.png".to_string()),
            badge: Some("/icons/badge-72.png".to_string()),
            vibrate: vec![100, 50, 100],
            primary_label: "Open".to_string(),
            dismiss_label: "Dismiss".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/resync/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("resync")
            .join("config.toml")
    }
}
