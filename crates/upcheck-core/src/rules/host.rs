//! Rules over live host observations and follow-up package manager runs.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::CheckResult;
use crate::config::SettingsMarker;

pub const SERVICE_REACHABLE: &str = "service_reachable";
pub const HOST_STATUS: &str = "host_status";
pub const CANNOT_UPDATE: &str = "cannot_update";
pub const CANNOT_INSTALL: &str = "cannot_install";

/// `yum update` output once nothing is left to update.
pub const NOTHING_TO_UPDATE: &str = "No packages marked for update";
/// `yum install` output when the package is already installed.
pub const NOTHING_TO_INSTALL: &str = "Nothing to do";

/// Live health probes taken after the upgrade. `None` means not observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostHealth {
    /// Management web service answered with HTTP 200.
    pub service_reachable: Option<bool>,
    /// Management plane reports the host as up.
    pub host_up: Option<bool>,
}

impl HostHealth {
    pub fn observed(service_reachable: bool, host_up: bool) -> Self {
        Self {
            service_reachable: Some(service_reachable),
            host_up: Some(host_up),
        }
    }
}

pub fn check_service_reachable(health: &HostHealth) -> CheckResult {
    match health.service_reachable {
        Some(true) => CheckResult::pass(SERVICE_REACHABLE),
        Some(false) => CheckResult::fail(SERVICE_REACHABLE, "management service is not reachable"),
        None => {
            warn!(check = SERVICE_REACHABLE, "service reachability was not observed");
            CheckResult::pass_with_note(SERVICE_REACHABLE, "not observed")
        }
    }
}

/// Passes when no management plane is configured (nothing to report the host state).
pub fn check_host_status(host_up: Option<bool>) -> CheckResult {
    match host_up {
        Some(true) => CheckResult::pass(HOST_STATUS),
        Some(false) => CheckResult::fail(HOST_STATUS, "host is not up on the management plane"),
        None => CheckResult::pass_with_note(HOST_STATUS, "no management plane host registered"),
    }
}

/// A settings file written before upgrade still holds its content. `observed` is the file text.
pub fn check_settings_marker(marker: &SettingsMarker, observed: &str) -> CheckResult {
    let name = format!("settings:{}", marker.path);
    info!(path = %marker.path, "checking preserved settings");
    if observed.contains(&marker.content) {
        CheckResult::pass(&name)
    } else {
        CheckResult::fail(
            &name,
            format!("{} no longer contains '{}'", marker.path, marker.content),
        )
    }
}

/// A repeated `yum update` after upgrade has nothing to do.
pub fn check_cannot_update(output: &str) -> CheckResult {
    if output.contains(NOTHING_TO_UPDATE) {
        CheckResult::pass(CANNOT_UPDATE)
    } else {
        CheckResult::fail(
            CANNOT_UPDATE,
            format!("second update still found packages: {}", output.trim()),
        )
    }
}

/// A repeated `yum install` of the same image fails with nothing to do.
pub fn check_cannot_install(success: bool, output: &str) -> CheckResult {
    let mut diagnostics = Vec::new();
    if success {
        diagnostics.push("second install of the update package succeeded".to_string());
    }
    if !output.contains(NOTHING_TO_INSTALL) {
        diagnostics.push(format!("second install output lacks '{NOTHING_TO_INSTALL}'"));
    }
    CheckResult::from_diagnostics(CANNOT_INSTALL, diagnostics)
}
