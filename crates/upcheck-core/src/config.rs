//! Verification settings.
//!
//! Every field has a default matching the RHVH 4.x upgrade expectations, so
//! an empty TOML table (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build::{new_volumes_expected, BuildId};
use crate::error::ConfigError;

/// An optional data volume introduced by newer builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVolume {
    /// Logical volume name, e.g. `var_log_audit`.
    pub name: String,
    /// Mount target, e.g. `/var/log/audit`.
    pub mount: String,
    /// Size string as printed by `lvs --unit=m`, e.g. `2048.00m`.
    pub size: String,
}

impl NewVolume {
    pub fn new(name: &str, mount: &str, size: &str) -> Self {
        Self {
            name: name.to_string(),
            mount: mount.to_string(),
            size: size.to_string(),
        }
    }
}

/// A file written before the upgrade whose content must survive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsMarker {
    pub path: String,
    pub content: String,
    /// Append to an existing file instead of creating a new one.
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Force the optional new-volume checks on or off; `None` derives it from build dates.
    pub check_new_lvs: Option<bool>,
    /// Builds dated after this `YYYYMMDD` create the optional volumes.
    pub new_lv_threshold: String,
    /// Minimum pool metadata size in megabytes after upgrade.
    pub tmeta_floor_mb: u64,
    pub new_volumes: Vec<NewVolume>,
    /// Sentinel carried by the update package installed before the upgrade.
    pub update_placeholder: String,
    pub check_kernel_space_package: bool,
    pub kernel_space_package: String,
    /// User-space package installed before upgrade and expected to survive rollback.
    pub marker_package: String,
    pub settings_markers: Vec<SettingsMarker>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_new_lvs: None,
            new_lv_threshold: "20170616".to_string(),
            tmeta_floor_mb: 1024,
            new_volumes: vec![
                NewVolume::new("home", "/home", "1024.00m"),
                NewVolume::new("tmp", "/tmp", "1024.00m"),
                NewVolume::new("var_log", "/var/log", "8192.00m"),
                NewVolume::new("var_log_audit", "/var/log/audit", "2048.00m"),
            ],
            update_placeholder: "placeholder".to_string(),
            check_kernel_space_package: false,
            kernel_space_package: "kmod-oracleasm".to_string(),
            marker_package: "httpd".to_string(),
            settings_markers: vec![
                SettingsMarker {
                    path: "/etc/upgrade_test".to_string(),
                    content: "test".to_string(),
                    append: false,
                },
                SettingsMarker {
                    path: "/etc/my.cnf".to_string(),
                    content: "# test".to_string(),
                    append: true,
                },
            ],
        }
    }
}

impl CheckConfig {
    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CheckConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.new_lv_threshold;
        if t.len() != 8 || !t.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "new_lv_threshold must be YYYYMMDD, got '{t}'"
            )));
        }
        if self.tmeta_floor_mb == 0 {
            return Err(ConfigError::Invalid(
                "tmeta_floor_mb must be positive".to_string(),
            ));
        }
        if let Some(v) = self.new_volumes.iter().find(|v| !v.size.ends_with('m')) {
            return Err(ConfigError::Invalid(format!(
                "new volume {} size '{}' must be in megabytes (e.g. 1024.00m)",
                v.name, v.size
            )));
        }
        if self.update_placeholder.is_empty() {
            return Err(ConfigError::Invalid(
                "update_placeholder must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the optional new-volume and new-mount checks apply to this upgrade.
    pub fn new_volumes_enabled(&self, source: &BuildId, target: &BuildId) -> bool {
        let enabled = self
            .check_new_lvs
            .unwrap_or_else(|| new_volumes_expected(source, target, &self.new_lv_threshold));
        debug!(
            forced = ?self.check_new_lvs,
            source = source.date(),
            target = target.date(),
            enabled,
            "new volume checks"
        );
        enabled
    }

    pub fn new_volume_mounts(&self) -> Vec<&str> {
        self.new_volumes.iter().map(|v| v.mount.as_str()).collect()
    }

    /// Token identifying the kernel module in `weak-updates` (`kmod-oracleasm` -> `oracleasm`).
    pub fn kernel_module_key(&self) -> &str {
        self.kernel_space_package
            .split_once('-')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.kernel_space_package)
    }
}
