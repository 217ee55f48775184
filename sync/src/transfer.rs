//! Single-file transfer to the remote host

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use backoff::future::retry_notify;
use backoff::ExponentialBackoffBuilder;
use tracing::{error, info, warn};

use crate::config::TransferOptions;
use crate::ensurer::RemoteDirectoryEnsurer;
use crate::error::{Result, SyncError};
use crate::remote::RemoteExecutor;
use crate::translator::{PathTranslator, RemoteLocation};

/// Result of one transfer, reported but never propagated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success: bool,
    /// Bytes copied, on success
    pub bytes: Option<u64>,
    /// Diagnostic text, on failure
    pub error: Option<String>,
    /// Remote attempts made (0 when a local precondition failed)
    pub attempts: u32,
}

impl TransferOutcome {
    fn succeeded(bytes: u64, attempts: u32) -> Self {
        Self { success: true, bytes: Some(bytes), error: None, attempts }
    }

    fn failed(error: &SyncError, attempts: u32) -> Self {
        Self { success: false, bytes: None, error: Some(error.to_string()), attempts }
    }
}

/// Copies one local file to its remote location, creating the remote
/// directory first
pub struct TransferExecutor {
    executor: Arc<dyn RemoteExecutor>,
    ensurer: RemoteDirectoryEnsurer,
    translator: Arc<PathTranslator>,
    options: TransferOptions,
}

impl TransferExecutor {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        translator: Arc<PathTranslator>,
        options: TransferOptions,
    ) -> Self {
        let ensurer = RemoteDirectoryEnsurer::new(executor.clone(), translator.platform())
            .with_memoization(options.memoize_directories);

        Self {
            executor,
            ensurer,
            translator,
            options,
        }
    }

    /// Copy `local` to `destination`, deriving the destination when absent.
    ///
    /// Every failure is logged and folded into the returned outcome.
    pub async fn transfer(&self, local: &Path, destination: Option<&RemoteLocation>) -> TransferOutcome {
        let mut attempts = 0;
        match self.try_transfer(local, destination, &mut attempts).await {
            Ok((location, bytes)) => {
                info!(
                    bytes,
                    attempts,
                    "file upload success: {} ({:.2} KB) -> {}",
                    local.display(),
                    bytes as f64 / 1024.0,
                    location.file_path
                );
                TransferOutcome::succeeded(bytes, attempts)
            }
            Err(e) => {
                error!(attempts, "file upload failed: {}", e);
                TransferOutcome::failed(&e, attempts)
            }
        }
    }

    async fn try_transfer(
        &self,
        local: &Path,
        destination: Option<&RemoteLocation>,
        attempts: &mut u32,
    ) -> Result<(RemoteLocation, u64)> {
        if local.as_os_str().is_empty() {
            return Err(SyncError::EmptyLocalPath);
        }

        let location = match destination {
            Some(location) => location.clone(),
            None => self.translator.translate(local)?,
        };

        let metadata = tokio::fs::metadata(local)
            .await
            .map_err(|_| SyncError::LocalFileMissing { path: PathBuf::from(local) })?;
        if !metadata.is_file() {
            return Err(SyncError::LocalFileMissing { path: PathBuf::from(local) });
        }

        self.upload_with_retry(local, &location, attempts).await?;
        Ok((location, metadata.len()))
    }

    async fn upload_with_retry(
        &self,
        local: &Path,
        location: &RemoteLocation,
        attempts: &mut u32,
    ) -> Result<()> {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.options.retry_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(60))
            .with_max_elapsed_time(None)
            .build();

        let limit = self.options.retry_attempts;
        let tries = AtomicU32::new(0);
        let counter = &tries;

        let result = retry_notify(
            schedule,
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::Relaxed) + 1;
                self.upload_once(local, location).await.map_err(|e| {
                    // the first attempt is not a retry
                    if e.is_retryable() && attempt <= limit {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            },
            |e: SyncError, delay: Duration| {
                warn!(
                    delay_ms = delay.as_millis() as u64,
                    "Retryable error occurred: {}",
                    e
                );
            },
        )
        .await;

        *attempts = tries.load(Ordering::Relaxed);
        result
    }

    async fn upload_once(&self, local: &Path, location: &RemoteLocation) -> Result<()> {
        if let Err(e) = self.ensurer.ensure(&location.dir).await {
            warn!("create remote directory failed: {}", location.dir);
            return Err(e);
        }

        let output = self.executor.copy_file(local, &location.file_path).await?;
        if !output.is_success() {
            return Err(SyncError::copy_error(local, &location.file_path, output.detail()));
        }
        Ok(())
    }
}
