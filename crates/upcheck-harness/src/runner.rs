//! Remote command execution.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of one command on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command exited zero.
    pub success: bool,

    /// Captured stdout followed by stderr, or the transport error text.
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Runs shell commands on the host under test.
///
/// Never returns an error: spawn failures and timeouts come back as
/// `success = false` with the error text as output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutput;

    /// Drop any cached session so the next call reconnects.
    async fn disconnect(&self) {}
}

/// Runs commands through `sh -c` on the local machine.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutput {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        execute(cmd, command, timeout).await
    }
}

/// Runs commands on a remote host through the system `ssh` client.
///
/// Authentication must already be non-interactive (keys or agent).
#[derive(Debug, Clone)]
pub struct SshRunner {
    host: String,
    user: String,
    connect_timeout_secs: u64,
}

impl SshRunner {
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            connect_timeout_secs: 10,
        }
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutput {
        let mut cmd = Command::new("ssh");
        cmd.args([
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
        ])
        .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
        .arg(self.destination())
        .arg("--")
        .arg(command);
        execute(cmd, command, timeout).await
    }
}

async fn execute(mut cmd: Command, label: &str, timeout: Duration) -> CommandOutput {
    let start = Instant::now();
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(command = label, error = %e, "failed to spawn command");
            return CommandOutput::failed(format!("failed to spawn '{label}': {e}"));
        }
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return CommandOutput::failed(format!("'{label}' failed: {e}")),
        Err(_) => {
            warn!(command = label, timeout_secs = timeout.as_secs(), "command timed out");
            return CommandOutput::failed(format!(
                "'{label}' timed out after {} seconds",
                timeout.as_secs()
            ));
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }

    debug!(
        command = label,
        exit_code = output.status.code().unwrap_or(-1),
        duration_ms = start.elapsed().as_millis() as u64,
        "command finished"
    );

    CommandOutput {
        success: output.status.success(),
        output: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_destination() {
        let runner = SshRunner::new("10.66.8.12", "root");
        assert_eq!(runner.destination(), "root@10.66.8.12");
        assert_eq!(runner.host(), "10.66.8.12");
    }

    #[tokio::test]
    async fn test_local_runner_captures_output() {
        let out = LocalRunner.run("echo hello", Duration::from_secs(10)).await;
        assert!(out.success);
        assert!(out.output.contains("hello"));
    }

    #[tokio::test]
    async fn test_local_runner_failure_keeps_stderr() {
        let out = LocalRunner
            .run("echo oops >&2; exit 3", Duration::from_secs(10))
            .await;
        assert!(!out.success);
        assert!(out.output.contains("oops"));
    }

    #[tokio::test]
    async fn test_timeout_is_failed_output() {
        let out = LocalRunner.run("sleep 5", Duration::from_millis(100)).await;
        assert!(!out.success);
        assert!(out.output.contains("timed out"));
    }
}
