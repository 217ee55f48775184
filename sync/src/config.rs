//! Immutable sync configuration shared by every engine component

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::filter::FilterOptions;
use crate::platform::RemotePlatform;

/// Everything the engine needs to know about where and what to sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub filter: FilterOptions,
    #[serde(default)]
    pub transfer: TransferOptions,
}

/// Remote host and the location of the mirror on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub platform: RemotePlatform,
    pub username: String,
    /// Mirror location relative to the user's home directory, one entry per
    /// path component so it can be rendered under any platform's syntax
    #[serde(default)]
    pub path: Vec<String>,
}

/// Failure policy for remote operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Extra attempts after a failed remote step (0 = fail immediately)
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Upper bound for a single remote command or copy (none = wait forever)
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Remember created remote directories for the rest of the process
    pub memoize_directories: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            retry_attempts: 0,
            retry_delay: Duration::from_millis(500),
            timeout: None,
            memoize_directories: false,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "192.168.100.90".to_string(),
            port: default_port(),
            platform: RemotePlatform::Linux,
            username: "admin".to_string(),
            path: vec!["sync".to_string(), "project_name".to_string()],
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            filter: FilterOptions::default(),
            transfer: TransferOptions::default(),
        }
    }
}

impl SyncConfig {
    /// Check every invariant the engine relies on
    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;
        self.filter.validate()?;
        Ok(())
    }

    /// Absolute mirror root on the remote host
    pub fn remote_root(&self) -> String {
        self.remote
            .platform
            .remote_root(&self.remote.username, &self.remote.path)
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SyncError::config("remote host cannot be empty"));
        }
        if self.port == 0 {
            return Err(SyncError::config("remote port cannot be 0"));
        }
        if self.username.trim().is_empty() {
            return Err(SyncError::config("remote username cannot be empty"));
        }
        for segment in &self.path {
            if segment.is_empty() {
                return Err(SyncError::config("remote path segments cannot be empty"));
            }
            if segment.contains(['/', '\\']) {
                return Err(SyncError::config(format!(
                    "remote path segment '{segment}' must be a single component"
                )));
            }
        }
        Ok(())
    }
}

fn default_port() -> u16 { 22 }
