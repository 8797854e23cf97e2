//! In-memory fakes for the harness collaborator traits (testing only)
//!
//! Provides `ScriptedRunner`, `MemoryManagementPlane` and `StaticServiceProbe`
//! that satisfy the trait contracts without a real host.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{HarnessError, Result};
use crate::management::ManagementPlane;
use crate::reachability::ServiceProbe;
use crate::runner::{CommandOutput, CommandRunner};

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Script {
    /// Queued responses per command; the last one repeats.
    responses: HashMap<String, VecDeque<CommandOutput>>,
    calls: Vec<String>,
    disconnects: usize,
}

/// Command runner that replays canned outputs keyed by the exact command text.
///
/// Unknown commands fail with `no script for '<command>'`.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<Script>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `command`. Several calls queue in order.
    pub fn respond(&self, command: &str, output: CommandOutput) -> &Self {
        let mut script = self.script.lock().unwrap();
        script
            .responses
            .entry(command.to_string())
            .or_default()
            .push_back(output);
        self
    }

    pub fn respond_ok(&self, command: &str, output: &str) -> &Self {
        self.respond(command, CommandOutput::ok(output))
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    pub fn disconnects(&self) -> usize {
        self.script.lock().unwrap().disconnects
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, _timeout: Duration) -> CommandOutput {
        let mut script = self.script.lock().unwrap();
        script.calls.push(command.to_string());
        match script.responses.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => CommandOutput::failed(format!("no script for '{command}'")),
        }
    }

    async fn disconnect(&self) {
        self.script.lock().unwrap().disconnects += 1;
    }
}

// ---------------------------------------------------------------------------
// MemoryManagementPlane
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PlaneState {
    /// Status sequence per host; the last one repeats.
    statuses: HashMap<String, VecDeque<String>>,
    upgrades: Vec<String>,
    fail_upgrade: bool,
}

/// Management plane backed by scripted host statuses.
#[derive(Debug, Default)]
pub struct MemoryManagementPlane {
    state: Mutex<PlaneState>,
}

impl MemoryManagementPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue statuses that successive `host_status` calls will return.
    pub fn with_statuses(self, host: &str, statuses: &[&str]) -> Self {
        self.state.lock().unwrap().statuses.insert(
            host.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn failing_upgrade(self) -> Self {
        self.state.lock().unwrap().fail_upgrade = true;
        self
    }

    /// Hosts an upgrade was requested for.
    pub fn upgrades(&self) -> Vec<String> {
        self.state.lock().unwrap().upgrades.clone()
    }
}

#[async_trait]
impl ManagementPlane for MemoryManagementPlane {
    async fn host_status(&self, host: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        Ok(match state.statuses.get_mut(host) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        })
    }

    async fn upgrade_host(&self, host: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_upgrade {
            return Err(HarnessError::Management(format!(
                "upgrade of {host} rejected"
            )));
        }
        state.upgrades.push(host.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticServiceProbe
// ---------------------------------------------------------------------------

/// Reachability probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticServiceProbe(pub bool);

#[async_trait]
impl ServiceProbe for StaticServiceProbe {
    async fn reachable(&self, _host: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_runner_sequences_then_repeats() {
        let runner = ScriptedRunner::new();
        runner
            .respond("imgbase w", CommandOutput::failed("connection refused"))
            .respond_ok("imgbase w", "You are on rhvh-4.1-0.20170522.0+1");

        let t = Duration::from_secs(1);
        assert!(!runner.run("imgbase w", t).await.success);
        assert!(runner.run("imgbase w", t).await.success);
        assert!(runner.run("imgbase w", t).await.success);
        assert_eq!(runner.call_count("imgbase w"), 3);
    }

    #[tokio::test]
    async fn test_scripted_runner_unknown_command_fails() {
        let out = ScriptedRunner::new().run("uptime", Duration::from_secs(1)).await;
        assert!(!out.success);
        assert!(out.output.contains("no script"));
    }

    #[tokio::test]
    async fn test_memory_plane_statuses() {
        let plane = MemoryManagementPlane::new().with_statuses("host1", &["installing", "up"]);
        assert_eq!(plane.host_status("host1").await.unwrap().as_deref(), Some("installing"));
        assert_eq!(plane.host_status("host1").await.unwrap().as_deref(), Some("up"));
        assert_eq!(plane.host_status("host1").await.unwrap().as_deref(), Some("up"));
        assert_eq!(plane.host_status("other").await.unwrap(), None);
    }
}
