use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use sshsync::{SyncEngine, SyncError, SyncStats};

use crate::config::DaemonSettings;
use crate::watcher::TreeWatcher;

pub struct SyncDaemon {
    engine: SyncEngine,
    settings: DaemonSettings,
    shutdown: CancellationToken,
}

impl SyncDaemon {
    pub fn new(engine: SyncEngine, settings: DaemonSettings) -> Self {
        Self {
            engine,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the daemon when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until Ctrl+C
    pub async fn run(self) -> Result<SyncStats> {
        let shutdown = self.shutdown_token();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C received, shutting down"),
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
            shutdown.cancel();
        });

        self.run_until_cancelled().await
    }

    /// Initial sync, then mirror live changes until the shutdown token fires
    #[instrument(skip(self))]
    pub async fn run_until_cancelled(self) -> Result<SyncStats> {
        let started = Local::now();
        let remote = &self.engine.config().remote;
        info!("sync from: {}", self.engine.local_root().display());
        info!(
            "sync to: {}@{}:{} ({})",
            remote.username,
            remote.host,
            self.engine.remote_root(),
            remote.platform
        );

        if self.settings.initial_sync {
            match self.engine.initial_sync(&self.shutdown).await {
                Ok(report) => info!(
                    discovered = report.discovered,
                    uploaded = report.uploaded,
                    failed = report.failed,
                    "Initial sync complete"
                ),
                Err(SyncError::Cancelled) => {
                    info!("Initial sync interrupted");
                    return Ok(self.finish(started));
                }
                Err(e) => return Err(e).context("initial sync"),
            }
        } else {
            info!("Initial sync skipped");
        }

        if self.shutdown.is_cancelled() {
            return Ok(self.finish(started));
        }

        let (event_tx, event_rx) = mpsc::channel(self.settings.queue_size);
        let watcher = TreeWatcher::start(self.engine.local_root(), event_tx)?;
        let router = self.engine.spawn_router(event_rx, self.shutdown.clone());
        info!("Sync daemon started, press Ctrl+C to stop");

        self.shutdown.cancelled().await;

        // Stop the event source first; the router finishes whatever it is
        // handling and then sees the cancelled token.
        drop(watcher);
        if let Err(e) = router.await {
            warn!("Event router task failed: {}", e);
        }

        Ok(self.finish(started))
    }

    fn finish(&self, started: chrono::DateTime<Local>) -> SyncStats {
        let stats = self.engine.router().stats();
        let elapsed = Local::now().signed_duration_since(started);
        info!(
            uploaded = stats.uploaded,
            failed = stats.failed,
            deleted = stats.deleted,
            filtered = stats.filtered,
            bytes = stats.bytes_transferred,
            elapsed_secs = elapsed.num_seconds(),
            "Session summary"
        );
        info!("bye");
        stats
    }
}
