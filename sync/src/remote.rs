//! Remote command execution and file copy over ssh/scp

use std::fmt;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};

/// Exit status and diagnostics of one remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the client was killed by a signal
    pub status: Option<i32>,
    /// Captured standard error text
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self { status: Some(0), stderr: String::new() }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self { status: Some(status), stderr: stderr.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Human-readable failure detail for logs
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        match (self.status, stderr.is_empty()) {
            (Some(code), true) => format!("exit status {code}"),
            (Some(code), false) => format!("exit status {code}: {stderr}"),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {stderr}"),
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// The two primitives the engine needs from the remote host.
///
/// `Err` is reserved for failures to run the operation at all (client
/// missing, timeout); a non-zero exit comes back as a [`CommandOutput`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run one shell command on the remote host
    async fn run_command(&self, command: &str) -> Result<CommandOutput>;

    /// Copy a local file to an absolute remote path
    async fn copy_file(&self, local: &Path, remote_path: &str) -> Result<CommandOutput>;
}

/// How the remote-shell client authenticates
#[derive(Clone)]
pub enum Credential {
    /// Password fed to `sshpass` via the environment
    Password(String),
    /// Keys or agent; the client must never prompt
    KeyBased,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::KeyBased => f.write_str("KeyBased"),
        }
    }
}

/// [`RemoteExecutor`] backed by the system `ssh`/`scp` clients
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: String,
    port: u16,
    username: String,
    credential: Credential,
    timeout: Option<Duration>,
}

impl SshExecutor {
    pub fn new(remote: &RemoteConfig, credential: Credential, timeout: Option<Duration>) -> Self {
        Self {
            host: remote.host.clone(),
            port: remote.port,
            username: remote.username.clone(),
            credential,
            timeout,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Program and arguments for running `command` remotely
    pub fn ssh_args(&self, command: &str) -> (String, Vec<String>) {
        // ssh takes the port with lowercase -p
        let mut args = vec!["-p".to_string(), self.port.to_string()];
        args.extend(self.batch_mode_args());
        args.push(self.destination());
        args.push(command.to_string());
        self.wrap("ssh", args)
    }

    /// Program and arguments for copying `local` to `remote_path`
    pub fn scp_args(&self, local: &Path, remote_path: &str) -> (String, Vec<String>) {
        // scp takes the port with uppercase -P
        let mut args = vec!["-P".to_string(), self.port.to_string()];
        args.extend(self.batch_mode_args());
        args.push(local.to_string_lossy().into_owned());
        args.push(format!("{}:{}", self.destination(), remote_path));
        self.wrap("scp", args)
    }

    fn batch_mode_args(&self) -> Vec<String> {
        match self.credential {
            Credential::Password(_) => Vec::new(),
            Credential::KeyBased => vec!["-o".to_string(), "BatchMode=yes".to_string()],
        }
    }

    fn wrap(&self, client: &str, args: Vec<String>) -> (String, Vec<String>) {
        match self.credential {
            Credential::Password(_) => {
                let mut wrapped = vec!["-e".to_string(), client.to_string()];
                wrapped.extend(args);
                ("sshpass".to_string(), wrapped)
            }
            Credential::KeyBased => (client.to_string(), args),
        }
    }

    async fn execute(&self, operation: &str, program: String, args: Vec<String>) -> Result<CommandOutput> {
        let mut command = Command::new(&program);
        command.args(&args).kill_on_drop(true);
        if let Credential::Password(password) = &self.credential {
            command.env("SSHPASS", password);
        }

        debug!(program = %program, operation, "Running remote-shell client");

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| SyncError::Timeout {
                    operation: operation.to_string(),
                    secs: limit.as_secs(),
                })?,
            None => command.output().await,
        }
        .map_err(|e| SyncError::spawn_error(&program, e))?;

        Ok(output.into())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let (program, args) = self.ssh_args(command);
        self.execute("remote command", program, args).await
    }

    async fn copy_file(&self, local: &Path, remote_path: &str) -> Result<CommandOutput> {
        let (program, args) = self.scp_args(local, remote_path);
        self.execute("remote copy", program, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> RemoteConfig {
        RemoteConfig {
            host: "192.168.100.90".to_string(),
            port: 2222,
            username: "admin".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ssh_args_with_password() {
        let executor = SshExecutor::new(&remote(), Credential::Password("secret".into()), None);
        let (program, args) = executor.ssh_args("mkdir -p '/home/admin/src'");

        assert_eq!(program, "sshpass");
        assert_eq!(
            args,
            vec!["-e", "ssh", "-p", "2222", "admin@192.168.100.90", "mkdir -p '/home/admin/src'"]
        );
        assert!(!args.iter().any(|arg| arg.contains("secret")));
    }

    #[test]
    fn test_scp_args_with_keys() {
        let executor = SshExecutor::new(&remote(), Credential::KeyBased, None);
        let (program, args) = executor.scp_args(Path::new("/proj/src/main.py"), "/home/admin/src/main.py");

        assert_eq!(program, "scp");
        assert_eq!(
            args,
            vec![
                "-P",
                "2222",
                "-o",
                "BatchMode=yes",
                "/proj/src/main.py",
                "admin@192.168.100.90:/home/admin/src/main.py",
            ]
        );
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::Password("secret".into()));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_output_detail() {
        assert_eq!(CommandOutput::failure(1, "Permission denied\n").detail(), "exit status 1: Permission denied");
        assert_eq!(CommandOutput::failure(255, "").detail(), "exit status 255");
        assert!(CommandOutput::success().is_success());
    }

    #[tokio::test]
    async fn test_missing_client_is_spawn_error() {
        let executor = SshExecutor::new(&remote(), Credential::KeyBased, None);
        let err = executor
            .execute("remote command", "sshsync-no-such-client".to_string(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Spawn { .. }));
    }
}
