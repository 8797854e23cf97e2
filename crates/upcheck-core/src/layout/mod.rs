//! Logical-volume and mount layout differ.
//!
//! Parses `lvs` and `findmnt -r -n` listings into records, computes the
//! before/after set differences and validates that the delta has one of the
//! shapes an upgrade is allowed to produce.

pub mod mounts;
pub mod volumes;

use serde::{Deserialize, Serialize};

pub use mounts::{MountDiff, MountListing, MountRecord};
pub use volumes::{LogicalVolumeRecord, VolumeDiff, VolumeListing};

/// Layout rule that can reject an upgrade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LayoutRule {
    /// Only the pool metadata volume may disappear from the listing.
    NoVanishedVolumes,
    /// The new layer and its base must show up as new volumes.
    NewLayerVolumes,
    /// Optional data volumes are either untouched or freshly added at their expected size.
    NewVolumes,
    /// Pool metadata grows to the floor or keeps its size.
    PoolMetadataSize,
    /// The new layer is mounted and was not mounted before.
    NewLayerMount,
    /// Optional data volume mounts are either untouched or freshly created.
    NewVolumeMounts,
}

/// A single layout rule violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutViolation {
    /// Which rule was violated.
    pub rule: LayoutRule,
    /// Human-readable explanation naming the offending values.
    pub reason: String,
}

impl LayoutViolation {
    pub(crate) fn new(rule: LayoutRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for LayoutViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.rule, self.reason)
    }
}

/// Collapse runs of whitespace so listings compare line-for-line regardless of column padding.
pub(crate) fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
