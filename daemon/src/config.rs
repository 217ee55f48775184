use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use sshsync::{FilterOptions, RemoteConfig, SyncConfig, TransferOptions};

/// File name looked up next to the executable when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "sshsync.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub filter: FilterOptions,
    #[serde(default)]
    pub transfer: TransferOptions,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Tree to mirror; the executable's directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,
    #[serde(default = "default_initial_sync")]
    pub initial_sync: bool,
    /// Use the ssh agent or key files instead of prompting for a password
    #[serde(default)]
    pub key_auth: bool,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
            local_root: None,
            initial_sync: default_initial_sync(),
            key_auth: false,
            queue_size: default_queue_size(),
        }
    }
}

impl DaemonConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: DaemonConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.sync_config().validate()?;

        if self.daemon.queue_size == 0 {
            anyhow::bail!("daemon.queue_size must be greater than 0");
        }
        if parse_level(&self.daemon.log_level).is_none() {
            anyhow::bail!("unknown log level: {}", self.daemon.log_level);
        }
        if let Some(root) = &self.daemon.local_root {
            if !root.is_dir() {
                anyhow::bail!("local root is not a directory: {}", root.display());
            }
        }

        Ok(())
    }

    /// The part of the configuration the engine consumes
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            remote: self.remote.clone(),
            filter: self.filter.clone(),
            transfer: self.transfer.clone(),
        }
    }
}

/// Directory holding the running executable
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable has no parent directory")
}

/// `sshsync.toml` beside the executable, or in the working directory if
/// the executable cannot be located
pub fn default_config_path() -> PathBuf {
    executable_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME))
}

pub fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(tracing::Level::TRACE),
        "debug" => Some(tracing::Level::DEBUG),
        "info" => Some(tracing::Level::INFO),
        "warn" => Some(tracing::Level::WARN),
        "error" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_initial_sync() -> bool { true }
fn default_queue_size() -> usize { 1000 }
