//! Remote platform path syntax and command forms

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Operating system of the remote host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePlatform {
    Linux,
    #[serde(rename = "macos")]
    MacOs,
    Windows,
}

/// Path-syntax convention shared by one or more platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFamily {
    Posix,
    Windows,
}

impl RemotePlatform {
    /// Every supported platform, in identifier order
    pub const ALL: [RemotePlatform; 3] = [Self::Linux, Self::MacOs, Self::Windows];

    pub fn family(self) -> PathFamily {
        match self {
            Self::Linux | Self::MacOs => PathFamily::Posix,
            Self::Windows => PathFamily::Windows,
        }
    }

    /// Identifier used in configuration files and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    pub fn separator(self) -> char {
        match self.family() {
            PathFamily::Posix => '/',
            PathFamily::Windows => '\\',
        }
    }

    /// Filesystem anchor every remote root starts from
    fn anchor(self) -> &'static str {
        match self {
            Self::Linux | Self::MacOs => "/",
            Self::Windows => "C:\\",
        }
    }

    /// Directory holding the per-user home directories
    fn home_parent(self) -> &'static str {
        match self {
            Self::Linux => "home",
            Self::MacOs | Self::Windows => "Users",
        }
    }

    /// Build the remote root: anchor, home parent, username, then `segments` in order.
    pub fn remote_root<S: AsRef<str>>(self, username: &str, segments: &[S]) -> String {
        let mut root = self.anchor().to_string();
        root = self.join(&root, self.home_parent());
        root = self.join(&root, username);
        for segment in segments {
            root = self.join(&root, segment.as_ref());
        }
        root
    }

    /// Join `tail` onto `base` with this platform's separator.
    ///
    /// An empty tail yields `base` unchanged; a base already ending in a
    /// separator (such as a drive anchor) gets no second one.
    pub fn join(self, base: &str, tail: &str) -> String {
        let sep = self.separator();
        if tail.is_empty() {
            return base.to_string();
        }
        if base.is_empty() {
            return tail.to_string();
        }
        if base.ends_with(sep) {
            format!("{base}{tail}")
        } else {
            format!("{base}{sep}{tail}")
        }
    }

    /// Containing directory of `path` under this platform's syntax.
    ///
    /// The filesystem anchor is kept intact: the parent of `/a` is `/`, the
    /// parent of `C:\a` is `C:\`.
    pub fn dirname(self, path: &str) -> String {
        let sep = self.separator();
        let Some(idx) = path.rfind(sep) else {
            return String::new();
        };

        let head = &path[..=idx];
        let trimmed = head.trim_end_matches(sep);
        if trimmed.is_empty() || self.is_drive(trimmed) {
            // keep exactly one separator after the anchor
            path[..trimmed.len() + sep.len_utf8()].to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn is_drive(self, s: &str) -> bool {
        match self.family() {
            PathFamily::Posix => false,
            PathFamily::Windows => {
                let bytes = s.as_bytes();
                bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
            }
        }
    }

    /// Shell command that creates `dir` and its ancestors, succeeding if it already exists
    pub fn mkdir_command(self, dir: &str) -> String {
        match self.family() {
            PathFamily::Windows => format!("if not exist \"{dir}\" mkdir \"{dir}\""),
            PathFamily::Posix => format!("mkdir -p {}", posix_quote(dir)),
        }
    }
}

/// Single-quote `s` for a POSIX shell.
fn posix_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl fmt::Display for RemotePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemotePlatform {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == s)
            .ok_or_else(|| SyncError::UnsupportedPlatform(s.to_string()))
    }
}
