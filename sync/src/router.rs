//! Routes filesystem events through filter, translation and transfer

use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::FileFilter;
use crate::transfer::{TransferExecutor, TransferOutcome};
use crate::translator::PathTranslator;

/// What happened on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEventKind {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

/// A filesystem notification, as delivered by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    /// Whether the affected path is a directory
    pub is_dir: bool,
}

impl FileEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Created(path.into()), is_dir: false }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Modified(path.into()), is_dir: false }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Deleted(path.into()), is_dir: false }
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind: FileEventKind::Moved { from: from.into(), to: to.into() },
            is_dir: false,
        }
    }

    /// Mark the event as concerning a directory
    pub fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }
}

/// How the router disposed of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Directory events are never synced on their own
    DirectoryIgnored,
    /// The path did not qualify
    Filtered,
    /// The path could not be mapped to the remote host
    OutsideRoot,
    /// A transfer ran, successfully or not
    Transferred(TransferOutcome),
    /// A deletion was logged; the remote copy is left in place
    DeletionLogged { remote_path: String },
    /// A move, handled as a deletion of the source then a creation of the destination
    Moved {
        source: Box<RouteOutcome>,
        destination: Box<RouteOutcome>,
    },
}

/// Session counters, logged at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub uploaded: u64,
    pub failed: u64,
    pub deleted: u64,
    pub filtered: u64,
    pub bytes_transferred: u64,
}

/// Single consumer of filesystem events.
///
/// Each event runs to completion (directory ensure, then copy) before the
/// next one is looked at.
pub struct EventRouter {
    filter: FileFilter,
    translator: Arc<PathTranslator>,
    transfer: TransferExecutor,
    stats: Mutex<SyncStats>,
}

impl EventRouter {
    pub fn new(filter: FileFilter, translator: Arc<PathTranslator>, transfer: TransferExecutor) -> Self {
        Self {
            filter,
            translator,
            transfer,
            stats: Mutex::new(SyncStats::default()),
        }
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn stats(&self) -> SyncStats {
        *self.stats.lock()
    }

    /// Drain `events` until the channel closes or `shutdown` fires.
    ///
    /// An event already being handled when shutdown fires is finished first.
    pub async fn run(&self, mut events: mpsc::Receiver<FileEvent>, shutdown: CancellationToken) {
        info!("Event router started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Shutdown requested, no longer accepting events");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event).await;
                    }
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }
        }

        info!("Event router stopped");
    }

    /// Handle one event to completion
    pub async fn handle(&self, event: FileEvent) -> RouteOutcome {
        if event.is_dir {
            debug!(?event, "Ignoring directory event");
            return RouteOutcome::DirectoryIgnored;
        }

        match event.kind {
            FileEventKind::Created(path) => self.on_upload(&path, "created").await,
            FileEventKind::Modified(path) => self.on_upload(&path, "modified").await,
            FileEventKind::Deleted(path) => self.on_deleted(&path),
            FileEventKind::Moved { from, to } => {
                let source = self.on_deleted(&from);
                let destination = self.on_upload(&to, "created").await;
                RouteOutcome::Moved {
                    source: Box::new(source),
                    destination: Box::new(destination),
                }
            }
        }
    }

    async fn on_upload(&self, path: &Path, action: &str) -> RouteOutcome {
        if !self.qualifies(path) {
            return RouteOutcome::Filtered;
        }

        info!("file {}: {}", action, path.display());

        let location = match self.translator.translate(path) {
            Ok(location) => location,
            Err(e) => {
                warn!("convert local file path to remote failed: {}", e);
                return RouteOutcome::OutsideRoot;
            }
        };

        let outcome = self.transfer.transfer(path, Some(&location)).await;

        let mut stats = self.stats.lock();
        match outcome.bytes {
            Some(bytes) if outcome.success => {
                stats.uploaded += 1;
                stats.bytes_transferred += bytes;
            }
            _ => stats.failed += 1,
        }
        drop(stats);

        RouteOutcome::Transferred(outcome)
    }

    fn on_deleted(&self, path: &Path) -> RouteOutcome {
        if !self.qualifies(path) {
            return RouteOutcome::Filtered;
        }

        let location = match self.translator.translate(path) {
            Ok(location) => location,
            Err(e) => {
                warn!("convert local file path to remote failed: {}", e);
                return RouteOutcome::OutsideRoot;
            }
        };

        // Remote deletion is not performed; the remote copy stays.
        info!(
            remote = %location.file_path,
            "file deleted: {} (remote copy kept)",
            path.display()
        );
        self.stats.lock().deleted += 1;

        RouteOutcome::DeletionLogged { remote_path: location.file_path }
    }

    fn qualifies(&self, path: &Path) -> bool {
        let included = self.filter.should_include(path);
        if !included {
            debug!("Filtered out: {}", path.display());
            self.stats.lock().filtered += 1;
        }
        included
    }
}
