//! Idempotent remote directory creation

use std::collections::HashSet;
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::platform::RemotePlatform;
use crate::remote::RemoteExecutor;

/// Creates remote directories (with ancestors) before files are copied into them
pub struct RemoteDirectoryEnsurer {
    executor: Arc<dyn RemoteExecutor>,
    platform: RemotePlatform,
    /// Directories already created by this process, when memoization is on
    created: Option<Mutex<HashSet<String>>>,
}

impl RemoteDirectoryEnsurer {
    pub fn new(executor: Arc<dyn RemoteExecutor>, platform: RemotePlatform) -> Self {
        Self {
            executor,
            platform,
            created: None,
        }
    }

    /// Skip the remote round-trip for directories this process already created
    pub fn with_memoization(mut self, enabled: bool) -> Self {
        self.created = enabled.then(|| Mutex::new(HashSet::new()));
        self
    }

    /// Make `dir` exist on the remote host; succeeds if it already does
    pub async fn ensure(&self, dir: &str) -> Result<()> {
        if let Some(created) = &self.created {
            if created.lock().contains(dir) {
                debug!(dir, "Remote directory already ensured");
                return Ok(());
            }
        }

        let command = self.platform.mkdir_command(dir);
        let output = self.executor.run_command(&command).await?;
        if !output.is_success() {
            let detail = output.detail();
            warn!(dir, %detail, "create directory failed");
            return Err(SyncError::directory_error(dir, detail));
        }

        if let Some(created) = &self.created {
            created.lock().insert(dir.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockRemote, RemoteCall};

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let remote = Arc::new(MockRemote::new());
        let ensurer = RemoteDirectoryEnsurer::new(remote.clone(), RemotePlatform::Linux);

        ensurer.ensure("/home/admin/sync/src").await.unwrap();
        ensurer.ensure("/home/admin/sync/src").await.unwrap();

        let expected = RemoteCall::Command("mkdir -p '/home/admin/sync/src'".to_string());
        assert_eq!(remote.calls(), vec![expected.clone(), expected]);
    }

    #[tokio::test]
    async fn test_ensure_uses_windows_command() {
        let remote = Arc::new(MockRemote::new());
        let ensurer = RemoteDirectoryEnsurer::new(remote.clone(), RemotePlatform::Windows);

        ensurer.ensure(r"C:\Users\admin\src").await.unwrap();

        assert_eq!(
            remote.calls(),
            vec![RemoteCall::Command(
                r#"if not exist "C:\Users\admin\src" mkdir "C:\Users\admin\src""#.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_ensure_reports_failure() {
        let remote = Arc::new(MockRemote::new());
        remote.fail_commands(1, "mkdir: Permission denied");
        let ensurer = RemoteDirectoryEnsurer::new(remote.clone(), RemotePlatform::Linux);

        let err = ensurer.ensure("/root/forbidden").await.unwrap_err();
        match err {
            SyncError::DirectoryCreation { dir, detail } => {
                assert_eq!(dir, "/root/forbidden");
                assert!(detail.contains("Permission denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_memoized_ensure_runs_once() {
        let remote = Arc::new(MockRemote::new());
        let ensurer = RemoteDirectoryEnsurer::new(remote.clone(), RemotePlatform::Linux)
            .with_memoization(true);

        ensurer.ensure("/home/admin/sync").await.unwrap();
        ensurer.ensure("/home/admin/sync").await.unwrap();
        ensurer.ensure("/home/admin/sync/src").await.unwrap();

        assert_eq!(remote.command_count(), 2);
    }

    #[tokio::test]
    async fn test_memoization_skips_failed_directories() {
        let remote = Arc::new(MockRemote::new());
        remote.fail_commands(1, "Connection reset");
        let ensurer = RemoteDirectoryEnsurer::new(remote.clone(), RemotePlatform::Linux)
            .with_memoization(true);

        assert!(ensurer.ensure("/home/admin/sync").await.is_err());
        assert!(ensurer.ensure("/home/admin/sync").await.is_ok());
        assert_eq!(remote.command_count(), 2);
    }
}
