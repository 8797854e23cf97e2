//! Error types for upcheck-harness

use thiserror::Error;
use upcheck_core::{ConfigError, SnapshotError};

/// Errors that abort an upgrade run.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A probe command failed, so the snapshot is discarded as a whole
    #[error("failed to collect {label} snapshot: probe {probe} failed: {output}")]
    CollectionFailed {
        label: String,
        probe: String,
        output: String,
    },

    /// A preparation step on the host failed
    #[error("preparation step '{step}' failed: {output}")]
    PreparationFailed { step: String, output: String },

    /// The upgrade action itself failed
    #[error("upgrade via {method} failed: {output}")]
    UpgradeFailed { method: String, output: String },

    /// `imgbase rollback` failed
    #[error("imgbase rollback failed: {output}")]
    RollbackFailed { output: String },

    /// Host did not come back after reboot
    #[error("host did not answer `imgbase w` after {attempts} attempts")]
    HostUnreachable { attempts: u32 },

    /// Host never reported `up` on the management plane
    #[error("host {host} not up on management plane after {attempts} polls")]
    HostNotUp { host: String, attempts: u32 },

    /// The upgrade method needs a collaborator that was not configured
    #[error("{method} requires {missing}")]
    MissingCollaborator {
        method: String,
        missing: &'static str,
    },

    /// Unrecognised upgrade method name
    #[error("unknown upgrade method '{0}' (expected yum_update, yum_install or rhvm_upgrade)")]
    UnknownMethod(String),

    /// Management plane call failed
    #[error("management plane error: {0}")]
    Management(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(String),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        HarnessError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
