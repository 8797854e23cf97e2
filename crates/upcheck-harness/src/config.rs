//! Harness timings and the combined `upcheck.toml` file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use upcheck_core::{CheckConfig, ConfigError};

/// Timeouts and polling bounds for talking to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Timeout for probes and ordinary commands.
    pub command_timeout_secs: u64,
    pub yum_update_timeout_secs: u64,
    pub yum_install_timeout_secs: u64,
    /// `systemctl reboot` usually drops the session; don't wait long.
    pub reboot_command_timeout_secs: u64,
    /// How many times to poll `imgbase w` after a reboot.
    pub enter_system_max_attempts: u32,
    pub enter_system_interval_secs: u64,
    pub enter_system_timeout_secs: u64,
    pub host_status_max_polls: u32,
    pub host_status_interval_secs: u64,
    /// Port of the host's management web service.
    pub service_port: u16,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 600,
            yum_update_timeout_secs: 1800,
            yum_install_timeout_secs: 1800,
            reboot_command_timeout_secs: 10,
            enter_system_max_attempts: 20,
            enter_system_interval_secs: 60,
            enter_system_timeout_secs: 30,
            host_status_max_polls: 20,
            host_status_interval_secs: 30,
            service_port: 9090,
        }
    }
}

impl HarnessConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enter_system_max_attempts == 0 || self.host_status_max_polls == 0 {
            return Err(ConfigError::Invalid(
                "poll counts must be at least 1".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "command_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Contents of `upcheck.toml`: `[checks]` and `[harness]` tables, both optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpcheckConfig {
    pub checks: CheckConfig,
    pub harness: HarnessConfig,
}

impl UpcheckConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: UpcheckConfig = toml::from_str(text)?;
        config.checks.validate()?;
        config.harness.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
