//! Reboot and reconnect.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::runner::CommandRunner;

pub const REBOOT_COMMAND: &str = "systemctl reboot";
pub const IMGBASE_W_COMMAND: &str = "imgbase w";

/// Who triggers the reboot after an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebootFlavor {
    /// We issue `systemctl reboot` ourselves.
    Manual,
    /// The management plane reboots the host as part of its upgrade flow.
    Auto,
}

/// Reboot (for the manual flavor), drop the session and poll `imgbase w`
/// until the host answers. Returns the `imgbase w` output.
pub async fn enter_system(
    runner: &dyn CommandRunner,
    flavor: RebootFlavor,
    config: &HarnessConfig,
) -> Result<String> {
    info!(flavor = ?flavor, "rebooting and logging back into the host");

    if flavor == RebootFlavor::Manual {
        // The session usually drops mid-command; the outcome is irrelevant.
        let _ = runner
            .run(
                REBOOT_COMMAND,
                Duration::from_secs(config.reboot_command_timeout_secs),
            )
            .await;
    }
    runner.disconnect().await;

    let interval = Duration::from_secs(config.enter_system_interval_secs);
    let timeout = Duration::from_secs(config.enter_system_timeout_secs);
    for attempt in 1..=config.enter_system_max_attempts {
        tokio::time::sleep(interval).await;
        let result = runner.run(IMGBASE_W_COMMAND, timeout).await;
        if result.success {
            info!(attempt, imgbase_w = %result.output.trim(), "host is back");
            return Ok(result.output);
        }
        warn!(attempt, output = %result.output.trim(), "host not reachable yet");
    }

    Err(HarnessError::HostUnreachable {
        attempts: config.enter_system_max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use crate::runner::CommandOutput;

    fn fast(max_attempts: u32) -> HarnessConfig {
        HarnessConfig {
            enter_system_max_attempts: max_attempts,
            enter_system_interval_secs: 0,
            ..HarnessConfig::default()
        }
    }

    #[tokio::test]
    async fn test_manual_reboot_then_reconnect() {
        let runner = ScriptedRunner::new();
        runner
            .respond_ok(REBOOT_COMMAND, "")
            .respond(IMGBASE_W_COMMAND, CommandOutput::failed("Connection refused"))
            .respond_ok(IMGBASE_W_COMMAND, "You are on rhvh-4.1-0.20170522.0+1\n");

        let w = enter_system(&runner, RebootFlavor::Manual, &fast(5)).await.unwrap();
        assert!(w.contains("20170522"));
        assert_eq!(runner.calls()[0], REBOOT_COMMAND);
        assert_eq!(runner.call_count(IMGBASE_W_COMMAND), 2);
        assert_eq!(runner.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_auto_flavor_skips_reboot() {
        let runner = ScriptedRunner::new();
        runner.respond_ok(IMGBASE_W_COMMAND, "You are on rhvh-4.1-0.20170522.0+1\n");
        enter_system(&runner, RebootFlavor::Auto, &fast(1)).await.unwrap();
        assert_eq!(runner.call_count(REBOOT_COMMAND), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_error() {
        let runner = ScriptedRunner::new();
        runner.respond(IMGBASE_W_COMMAND, CommandOutput::failed("No route to host"));
        let err = enter_system(&runner, RebootFlavor::Auto, &fast(3)).await.unwrap_err();
        assert!(matches!(err, HarnessError::HostUnreachable { attempts: 3 }));
        assert_eq!(runner.call_count(IMGBASE_W_COMMAND), 3);
    }
}
