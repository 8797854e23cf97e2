//! Host preparation and the follow-up observations the extra suites consume.

use std::time::Duration;

use tracing::{info, warn};
use upcheck_core::suite::persistence_unsupported;
use upcheck_core::{BuildId, CheckConfig, KernelSpaceObservation, SettingsMarker};

use crate::error::{HarnessError, Result};
use crate::runner::{CommandOutput, CommandRunner};

/// `rpm -qa` with each package's signature summary.
pub const SIGNATURE_REPORT_COMMAND: &str =
    "rpm -qa --qf '%{name}-%{version}-%{release}.%{arch} (%{SIGPGP:pgpsig})\\n'";
pub const UNAME_COMMAND: &str = "uname -r";
pub const PERSISTED_RPMS_COMMAND: &str = "ls /var/imgbased/persisted-rpms";

pub fn marker_packages_command(marker: &str) -> String {
    format!("rpm -qa | grep --color=never {marker}")
}

pub fn weak_updates_command(kernel: &str) -> String {
    format!("ls /usr/lib/modules/{kernel}/weak-updates/")
}

fn write_marker_command(marker: &SettingsMarker) -> String {
    let redirect = if marker.append { ">>" } else { ">" };
    format!("echo '{}' {} {}", marker.content, redirect, marker.path)
}

/// Write every settings marker file before the upgrade.
pub async fn write_settings_markers(
    runner: &dyn CommandRunner,
    markers: &[SettingsMarker],
    timeout: Duration,
) -> Result<()> {
    for marker in markers {
        info!(path = %marker.path, append = marker.append, "writing settings marker");
        let result = runner.run(&write_marker_command(marker), timeout).await;
        if !result.success {
            return Err(HarnessError::PreparationFailed {
                step: format!("write {}", marker.path),
                output: result.output,
            });
        }
    }
    Ok(())
}

/// Read each marker file back. A failed read yields empty content, which fails the check.
pub async fn read_settings_markers(
    runner: &dyn CommandRunner,
    markers: &[SettingsMarker],
    timeout: Duration,
) -> Vec<(SettingsMarker, String)> {
    let mut observed = Vec::with_capacity(markers.len());
    for marker in markers {
        let result = runner.run(&format!("cat {}", marker.path), timeout).await;
        if !result.success {
            warn!(path = %marker.path, output = %result.output.trim(), "cannot read settings marker");
        }
        observed.push((marker.clone(), listing(result)));
    }
    observed
}

/// Marker package listing; empty when the package is not installed.
pub async fn marker_packages(runner: &dyn CommandRunner, marker: &str, timeout: Duration) -> String {
    listing(runner.run(&marker_packages_command(marker), timeout).await)
}

/// Weak-updates and persisted-rpm listings for the running kernel.
pub async fn kernel_space(runner: &dyn CommandRunner, timeout: Duration) -> KernelSpaceObservation {
    let kernel = runner.run(UNAME_COMMAND, timeout).await;
    let weak_updates = if kernel.success {
        listing(runner.run(&weak_updates_command(kernel.output.trim()), timeout).await)
    } else {
        warn!(output = %kernel.output.trim(), "cannot read kernel version");
        String::new()
    };
    let persisted_rpms = listing(runner.run(PERSISTED_RPMS_COMMAND, timeout).await);
    KernelSpaceObservation {
        weak_updates,
        persisted_rpms,
    }
}

fn listing(result: CommandOutput) -> String {
    if result.success {
        result.output
    } else {
        String::new()
    }
}

/// Signature report; a failed command is passed through so the check can fail on it.
pub async fn signature_report(runner: &dyn CommandRunner, timeout: Duration) -> CommandOutput {
    runner.run(SIGNATURE_REPORT_COMMAND, timeout).await
}

/// Repeat `yum update` after the upgrade.
pub async fn repeat_update(runner: &dyn CommandRunner, timeout: Duration) -> CommandOutput {
    runner.run("yum update", timeout).await
}

/// Repeat `yum install` of the already installed update rpm.
pub async fn repeat_install(runner: &dyn CommandRunner, rpm_path: &str, timeout: Duration) -> CommandOutput {
    runner.run(&format!("yum install {rpm_path}"), timeout).await
}

/// Whether the marker package needs a baseline for this upgrade.
pub fn wants_marker_baseline(config: &CheckConfig, source: &BuildId) -> bool {
    !config.marker_package.is_empty() && !persistence_unsupported(source)
}
