//! Error types for the sync engine library

use std::path::PathBuf;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Comprehensive error type for sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid or unsupported configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform identifier outside the supported set
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Local path lies outside the watched tree
    #[error("'{path}' is not under sync root '{root}'")]
    NotUnderRoot { path: PathBuf, root: PathBuf },

    /// Transfer requested without a local path
    #[error("local path is empty")]
    EmptyLocalPath,

    /// Local file vanished before it could be transferred
    #[error("local file not found: {path}")]
    LocalFileMissing { path: PathBuf },

    /// Remote directory command exited non-zero
    #[error("create directory '{dir}' failed: {detail}")]
    DirectoryCreation { dir: String, detail: String },

    /// Remote copy exited non-zero
    #[error("file upload '{local}' -> '{remote}' failed: {detail}")]
    RemoteCopy {
        local: PathBuf,
        remote: String,
        detail: String,
    },

    /// Failed to launch the remote-shell client
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote operation exceeded the configured timeout
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Directory scanning errors
    #[error("Directory scan error at '{path}': {message}")]
    DirectoryScan { path: PathBuf, message: String },

    /// Cancellation error
    #[error("Operation was cancelled")]
    Cancelled,
}

impl SyncError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new directory creation error
    pub fn directory_error(dir: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::DirectoryCreation {
            dir: dir.into(),
            detail: detail.into(),
        }
    }

    /// Create a new remote copy error
    pub fn copy_error(
        local: impl Into<PathBuf>,
        remote: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::RemoteCopy {
            local: local.into(),
            remote: remote.into(),
            detail: detail.into(),
        }
    }

    /// Create a new spawn error
    pub fn spawn_error(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a new directory scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryScan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether a second attempt of the same remote step could succeed.
    ///
    /// Local precondition failures are terminal for the event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryCreation { .. }
                | Self::RemoteCopy { .. }
                | Self::Timeout { .. }
                | Self::Spawn { .. }
        )
    }
}
