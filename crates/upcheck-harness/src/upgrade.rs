//! Upgrade methods.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::lifecycle::RebootFlavor;
use crate::management::ManagementPlane;
use crate::runner::CommandRunner;

/// How the host is upgraded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeMethod {
    /// `yum -y update` against the configured repositories
    YumUpdate,

    /// `yum -y install <image-update rpm>`
    YumInstall,

    /// Upgrade triggered through the management plane
    RhvmUpgrade,
}

impl UpgradeMethod {
    pub const ALL: [UpgradeMethod; 3] = [
        UpgradeMethod::YumUpdate,
        UpgradeMethod::YumInstall,
        UpgradeMethod::RhvmUpgrade,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UpgradeMethod::YumUpdate => "yum_update",
            UpgradeMethod::YumInstall => "yum_install",
            UpgradeMethod::RhvmUpgrade => "rhvm_upgrade",
        }
    }

    /// Pick the method named inside a kickstart file name, e.g. `ati_upgrade_yum_update.ks`.
    pub fn from_kickstart(ks: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| ks.contains(m.name()))
            .ok_or_else(|| HarnessError::UnknownMethod(ks.to_string()))
    }

    pub fn reboot_flavor(&self) -> RebootFlavor {
        match self {
            UpgradeMethod::RhvmUpgrade => RebootFlavor::Auto,
            _ => RebootFlavor::Manual,
        }
    }

    /// Shell command for the package-manager methods; `None` for the management plane.
    pub fn command(&self, rpm_path: Option<&str>) -> Result<Option<String>> {
        match self {
            UpgradeMethod::YumUpdate => Ok(Some("yum -y update > /root/yum_update.log".to_string())),
            UpgradeMethod::YumInstall => {
                let rpm = rpm_path.ok_or(HarnessError::MissingCollaborator {
                    method: self.name().to_string(),
                    missing: "an update rpm path",
                })?;
                Ok(Some(format!("yum -y install {rpm} > /root/yum_install.log")))
            }
            UpgradeMethod::RhvmUpgrade => Ok(None),
        }
    }

    fn timeout(&self, config: &HarnessConfig) -> Duration {
        match self {
            UpgradeMethod::YumInstall => Duration::from_secs(config.yum_install_timeout_secs),
            _ => Duration::from_secs(config.yum_update_timeout_secs),
        }
    }
}

impl std::fmt::Display for UpgradeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for UpgradeMethod {
    type Err = HarnessError;

    /// Accepts `yum_update` and `yum-update` spellings.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| HarnessError::UnknownMethod(s.to_string()))
    }
}

/// Perform the upgrade action. Rebooting is left to the caller.
pub async fn perform_upgrade(
    method: UpgradeMethod,
    runner: &dyn CommandRunner,
    plane: Option<&dyn ManagementPlane>,
    host: &str,
    rpm_path: Option<&str>,
    config: &HarnessConfig,
) -> Result<()> {
    info!(method = %method, host, "running upgrade, please wait");

    match method.command(rpm_path)? {
        Some(command) => {
            let result = runner.run(&command, method.timeout(config)).await;
            if !result.success {
                return Err(HarnessError::UpgradeFailed {
                    method: method.to_string(),
                    output: result.output,
                });
            }
        }
        None => {
            let plane = plane.ok_or(HarnessError::MissingCollaborator {
                method: method.to_string(),
                missing: "a management plane",
            })?;
            plane
                .upgrade_host(host)
                .await
                .map_err(|e| HarnessError::UpgradeFailed {
                    method: method.to_string(),
                    output: e.to_string(),
                })?;
        }
    }

    info!(method = %method, "upgrade finished");
    Ok(())
}
