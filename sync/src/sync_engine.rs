//! Main sync engine that wires the components together

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::filter::FileFilter;
use crate::initial_sync::{InitialSyncDriver, InitialSyncReport};
use crate::remote::RemoteExecutor;
use crate::router::{EventRouter, FileEvent};
use crate::transfer::TransferExecutor;
use crate::translator::PathTranslator;

/// Mirrors one local tree onto one remote host
pub struct SyncEngine {
    config: SyncConfig,
    translator: Arc<PathTranslator>,
    router: Arc<EventRouter>,
}

impl SyncEngine {
    /// Validate `config` and build every component around `executor`.
    ///
    /// This is the only place a configuration problem surfaces; once an
    /// engine exists, failures are per event.
    pub fn new(
        config: SyncConfig,
        local_root: impl Into<PathBuf>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Result<Self> {
        config.validate()?;

        let local_root = local_root.into();
        if !local_root.is_absolute() {
            return Err(SyncError::config(format!(
                "local root must be absolute: {}",
                local_root.display()
            )));
        }

        let translator = Arc::new(PathTranslator::new(local_root, &config));
        let transfer = TransferExecutor::new(executor, translator.clone(), config.transfer.clone());
        let router = Arc::new(EventRouter::new(
            FileFilter::new(&config.filter),
            translator.clone(),
            transfer,
        ));

        Ok(Self {
            config,
            translator,
            router,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn local_root(&self) -> &Path {
        self.translator.local_root()
    }

    pub fn remote_root(&self) -> &str {
        self.translator.remote_root()
    }

    pub fn router(&self) -> Arc<EventRouter> {
        self.router.clone()
    }

    /// Upload every qualifying file once; must finish before watching starts
    pub async fn initial_sync(&self, shutdown: &CancellationToken) -> Result<InitialSyncReport> {
        info!("init: scanning {}", self.local_root().display());
        InitialSyncDriver::new(self.local_root())
            .run(&self.router, shutdown)
            .await
    }

    /// Start the single event-consuming task
    pub fn spawn_router(&self, events: mpsc::Receiver<FileEvent>, shutdown: CancellationToken) -> JoinHandle<()> {
        let router = self.router.clone();
        tokio::spawn(async move { router.run(events, shutdown).await })
    }
}
