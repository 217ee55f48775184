//! File filtering by ignored folders, forced names and allowed extensions

use std::collections::HashSet;
use std::path::{Component, Path};
use serde::{Deserialize, Serialize};

/// File filter options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Folder names whose subtrees are never synced (highest priority)
    pub ignore_folders: Vec<String>,
    /// File names that are always synced, whatever their extension
    pub file_names: Vec<String>,
    /// Extensions that are synced, including the leading dot (".py")
    pub file_extensions: Vec<String>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            ignore_folders: vec![
                "__pycache__".to_string(),
                ".git".to_string(),
                ".vscode".to_string(),
            ],
            file_names: vec!["Makefile".to_string(), "Dockerfile".to_string()],
            file_extensions: [
                ".py", // Python
                ".h", ".c", ".cpp", ".hpp", // C/C++
                ".sh", ".bat", ".zsh", // shell
                ".txt", // requirements.txt, CMakeLists.txt
                ".json",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
        }
    }
}

impl FilterOptions {
    /// Reject empty entries and extensions missing their leading dot
    pub fn validate(&self) -> crate::Result<()> {
        let empty = |list: &[String]| list.iter().any(|entry| entry.is_empty());
        if empty(&self.ignore_folders) || empty(&self.file_names) || empty(&self.file_extensions) {
            return Err(crate::SyncError::config("filter entries cannot be empty"));
        }
        if let Some(ext) = self.file_extensions.iter().find(|ext| !ext.starts_with('.')) {
            return Err(crate::SyncError::config(format!(
                "file extension '{ext}' must start with '.'"
            )));
        }
        Ok(())
    }
}

/// Decides which files participate in sync.
///
/// Rules apply in order: an ignored folder anywhere in the path excludes it,
/// then a forced file name includes it, then the extension decides.
#[derive(Debug, Clone)]
pub struct FileFilter {
    ignore_folders: HashSet<String>,
    file_names: HashSet<String>,
    file_extensions: HashSet<String>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&FilterOptions::default())
    }
}

impl FileFilter {
    /// Create a new file filter with the given options
    pub fn new(options: &FilterOptions) -> Self {
        Self {
            ignore_folders: options.ignore_folders.iter().cloned().collect(),
            file_names: options.file_names.iter().cloned().collect(),
            file_extensions: options.file_extensions.iter().cloned().collect(),
        }
    }

    /// Check if a file path should be synced
    pub fn should_include(&self, path: &Path) -> bool {
        if self.in_ignored_folder(path) {
            return false;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if self.file_names.contains(name) {
            return true;
        }

        match extension_of(name) {
            Some(ext) => self.file_extensions.contains(ext),
            None => false,
        }
    }

    /// Whether any component of `path` is an ignored folder name
    pub fn in_ignored_folder(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => name
                .to_str()
                .map(|s| self.ignore_folders.contains(s))
                .unwrap_or(false),
            _ => false,
        })
    }

    /// Whether a single directory name is ignored (used to prune walks)
    pub fn is_ignored_folder_name(&self, name: &str) -> bool {
        self.ignore_folders.contains(name)
    }
}

/// Final extension of a file name including the dot, ignoring a leading dot
/// (so `.bashrc` has none and `archive.tar.gz` has `.gz`).
fn extension_of(name: &str) -> Option<&str> {
    let trimmed = name.trim_start_matches('.');
    let offset = name.len() - trimmed.len();
    trimmed
        .rfind('.')
        .map(|idx| &name[offset + idx..])
        .filter(|ext| ext.len() > 1)
}
