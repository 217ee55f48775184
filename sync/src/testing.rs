//! In-memory remote host used by the engine's tests

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::remote::{CommandOutput, RemoteExecutor};

/// One primitive invocation seen by [`MockRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Command(String),
    Copy { local: PathBuf, remote: String },
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<RemoteCall>,
    failing_commands: usize,
    failing_copies: usize,
    stderr: String,
}

/// Records every call; the next N commands or copies can be made to fail
#[derive(Debug, Default)]
pub struct MockRemote {
    script: Mutex<Script>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` remote commands exit with status 1
    pub fn fail_commands(&self, count: usize, stderr: &str) {
        let mut script = self.script.lock();
        script.failing_commands = count;
        script.stderr = stderr.to_string();
    }

    /// Make the next `count` copies exit with status 1
    pub fn fail_copies(&self, count: usize, stderr: &str) {
        let mut script = self.script.lock();
        script.failing_copies = count;
        script.stderr = stderr.to_string();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.script.lock().calls.clone()
    }

    pub fn command_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RemoteCall::Command(_)))
            .count()
    }

    /// Remote destinations of every copy, in call order
    pub fn copied(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Copy { remote, .. } => Some(remote),
                RemoteCall::Command(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for MockRemote {
    async fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let mut script = self.script.lock();
        script.calls.push(RemoteCall::Command(command.to_string()));
        if script.failing_commands > 0 {
            script.failing_commands -= 1;
            return Ok(CommandOutput::failure(1, script.stderr.clone()));
        }
        Ok(CommandOutput::success())
    }

    async fn copy_file(&self, local: &Path, remote_path: &str) -> Result<CommandOutput> {
        let mut script = self.script.lock();
        script.calls.push(RemoteCall::Copy {
            local: local.to_path_buf(),
            remote: remote_path.to_string(),
        });
        if script.failing_copies > 0 {
            script.failing_copies -= 1;
            return Ok(CommandOutput::failure(1, script.stderr.clone()));
        }
        Ok(CommandOutput::success())
    }
}
