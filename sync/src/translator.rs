//! Local → remote path translation

use std::path::{Component, Path, PathBuf};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::platform::RemotePlatform;

/// Where a local file lives on the remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    /// Remote absolute path of the file
    pub file_path: String,
    /// Remote directory containing the file
    pub dir: String,
}

/// Maps paths under the local root onto the remote root.
///
/// Everything after the relative path is computed is built with the remote
/// platform's rules; local separators never leak into the result.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    local_root: PathBuf,
    remote_root: String,
    platform: RemotePlatform,
}

impl PathTranslator {
    pub fn new(local_root: impl Into<PathBuf>, config: &SyncConfig) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: config.remote_root(),
            platform: config.remote.platform,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    pub fn platform(&self) -> RemotePlatform {
        self.platform
    }

    /// Translate a local absolute path into its remote location.
    ///
    /// Fails with [`SyncError::NotUnderRoot`] when `local` is outside the
    /// local root; the caller should skip the event.
    pub fn translate(&self, local: &Path) -> Result<RemoteLocation> {
        let relative = local
            .strip_prefix(&self.local_root)
            .map_err(|_| SyncError::NotUnderRoot {
                path: local.to_path_buf(),
                root: self.local_root.clone(),
            })?;

        let sep = self.platform.separator().to_string();
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => parts.push(name.to_string_lossy()),
                Component::CurDir => {}
                // `..` would climb out of the mirror
                _ => {
                    return Err(SyncError::NotUnderRoot {
                        path: local.to_path_buf(),
                        root: self.local_root.clone(),
                    })
                }
            }
        }
        let relative = parts.join(&sep);

        let file_path = self.platform.join(&self.remote_root, &relative);
        let dir = self.platform.dirname(&file_path);
        Ok(RemoteLocation { file_path, dir })
    }
}
