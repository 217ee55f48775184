//! One-shot upload of the whole local tree at startup

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, SyncError};
use crate::filter::FileFilter;
use crate::router::{EventRouter, FileEvent, RouteOutcome};

/// Counts from one initial pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialSyncReport {
    /// Qualifying files found by the walk
    pub discovered: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// Walks the local root once, feeding every qualifying file to the router
/// as a creation
pub struct InitialSyncDriver {
    root: PathBuf,
}

impl InitialSyncDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Qualifying files under the root, in walk order.
    ///
    /// Ignored folders are pruned before they are descended into.
    pub fn collect(&self, filter: &FileFilter) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(SyncError::scan_error(&self.root, "Path is not a directory"));
        }

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored_dir(entry, filter));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error under {}: {}", self.root.display(), e);
                    continue;
                }
            };

            if is_file(&entry) && filter.should_include(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Upload every qualifying file through `router`.
    ///
    /// Stops between files once `shutdown` fires and returns
    /// [`SyncError::Cancelled`].
    pub async fn run(&self, router: &EventRouter, shutdown: &CancellationToken) -> Result<InitialSyncReport> {
        let root = self.root.clone();
        let filter = router.filter().clone();
        let files = tokio::task::spawn_blocking(move || InitialSyncDriver::new(root).collect(&filter))
            .await
            .map_err(|e| SyncError::scan_error(&self.root, format!("walk task failed: {e}")))??;

        let mut report = InitialSyncReport {
            discovered: files.len(),
            ..Default::default()
        };

        for path in files {
            if shutdown.is_cancelled() {
                warn!(
                    uploaded = report.uploaded,
                    remaining = report.discovered - report.uploaded - report.failed,
                    "init: interrupted"
                );
                return Err(SyncError::Cancelled);
            }

            info!("init: upload file {}", path.display());
            match router.handle(FileEvent::created(path)).await {
                RouteOutcome::Transferred(outcome) if outcome.success => report.uploaded += 1,
                _ => report.failed += 1,
            }
        }

        info!(
            uploaded = report.uploaded,
            failed = report.failed,
            "init: upload all files done"
        );
        Ok(report)
    }
}

fn is_ignored_dir(entry: &DirEntry, filter: &FileFilter) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| filter.is_ignored_folder_name(name))
            .unwrap_or(false)
}

fn is_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && Path::is_file(entry.path()))
}
