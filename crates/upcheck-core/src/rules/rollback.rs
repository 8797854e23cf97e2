//! Rollback and persisted-package rules.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{line_set, CheckResult};
use crate::config::CheckConfig;

pub const ROLLBACK_LAYER: &str = "rollback_layer";
pub const USR_SPACE_RPM: &str = "usr_space_rpm";
pub const KNL_SPACE_RPM: &str = "knl_space_rpm";

/// Listings used to confirm a kernel module package was persisted across layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpaceObservation {
    /// `ls /usr/lib/modules/$(uname -r)/weak-updates/`
    pub weak_updates: String,
    /// `ls /var/imgbased/persisted-rpms`
    pub persisted_rpms: String,
}

/// What the host looked like after `imgbase rollback` and a reboot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackObservation {
    /// `imgbase w` after the rollback reboot.
    pub imgbase_w: String,
    pub host_up: Option<bool>,
    /// `rpm -qa | grep <marker>` after rollback.
    pub marker_packages: String,
    /// Only collected when kernel-space verification is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<KernelSpaceObservation>,
}

/// After rollback the host is back on exactly the pre-upgrade layer.
pub fn check_rollback_layer(pre_upgrade_w: &str, observed_w: &str) -> CheckResult {
    let expected = pre_upgrade_w.trim();
    let actual = observed_w.trim();
    info!(expected, actual, "checking rollback layer");
    if expected == actual {
        CheckResult::pass(ROLLBACK_LAYER)
    } else {
        CheckResult::fail(
            ROLLBACK_LAYER,
            format!("after rollback imgbase w is '{actual}', expected '{expected}'"),
        )
    }
}

/// The marker package set installed before upgrade is present and unchanged.
pub fn check_user_space_rpm(marker: &str, baseline: &str, observed: &str) -> CheckResult {
    let baseline = line_set(baseline);
    let observed = line_set(observed);
    info!(marker, baseline = baseline.len(), observed = observed.len(), "checking user space rpms");

    if observed.is_empty() {
        return CheckResult::fail(USR_SPACE_RPM, format!("user space rpm {marker} is not installed"));
    }
    let changed: Vec<&str> = baseline.symmetric_difference(&observed).copied().collect();
    if changed.is_empty() {
        CheckResult::pass(USR_SPACE_RPM)
    } else {
        CheckResult::fail(
            USR_SPACE_RPM,
            format!("user space rpm {marker} is not persisted, differing packages: {changed:?}"),
        )
    }
}

/// The kernel module package is built into weak-updates and recorded as persisted.
pub fn check_kernel_space_rpm(config: &CheckConfig, observed: &KernelSpaceObservation) -> CheckResult {
    let package = &config.kernel_space_package;
    let module = config.kernel_module_key();
    let mut diagnostics = Vec::new();

    if !observed.weak_updates.contains(module) {
        diagnostics.push(format!(
            "weak-updates listing '{}' does not include {module}",
            observed.weak_updates.trim()
        ));
    }
    if !observed.persisted_rpms.contains(package.as_str()) {
        diagnostics.push(format!(
            "persisted-rpms listing '{}' does not include {package}",
            observed.persisted_rpms.trim()
        ));
    }
    CheckResult::from_diagnostics(KNL_SPACE_RPM, diagnostics)
}
