//! Sync Engine Library
//!
//! Mirrors a local directory tree onto a remote host over ssh/scp:
//! - Filtering by ignored folders, forced file names and extensions
//! - Local → remote path translation across path-syntax families
//! - Idempotent remote directory creation
//! - Single-file transfer with observable, bounded failure handling
//! - Sequential routing of filesystem events
//! - A one-shot initial upload of the whole tree

pub mod config;
pub mod platform;
pub mod filter;
pub mod translator;
pub mod remote;
pub mod ensurer;
pub mod transfer;
pub mod router;
pub mod initial_sync;
pub mod sync_engine;
pub mod error;

// Re-export main types and functions
pub use config::{RemoteConfig, SyncConfig, TransferOptions};
pub use platform::{PathFamily, RemotePlatform};
pub use filter::{FileFilter, FilterOptions};
pub use translator::{PathTranslator, RemoteLocation};
pub use remote::{CommandOutput, Credential, RemoteExecutor, SshExecutor};
pub use ensurer::RemoteDirectoryEnsurer;
pub use transfer::{TransferExecutor, TransferOutcome};
pub use router::{EventRouter, FileEvent, FileEventKind, RouteOutcome, SyncStats};
pub use initial_sync::{InitialSyncDriver, InitialSyncReport};
pub use sync_engine::SyncEngine;
pub use error::{SyncError, Result};

// Test modules
#[cfg(test)]
mod testing;
