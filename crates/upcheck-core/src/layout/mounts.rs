//! `findmnt -r -n` listing records and mount-level rules.

use std::collections::BTreeSet;

use tracing::debug;

use super::{normalize_line, LayoutRule, LayoutViolation};
use crate::build::ImgbaseLayer;

/// One line of `findmnt -r -n`: `<target> <source> <fstype> <options>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub target: String,
    /// Whitespace-normalized line.
    pub raw: String,
}

impl MountRecord {
    pub fn parse_line(line: &str) -> Option<Self> {
        let raw = normalize_line(line);
        let target = raw.split(' ').next().filter(|t| !t.is_empty())?.to_string();
        Some(Self { target, raw })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountListing {
    records: Vec<MountRecord>,
}

impl MountListing {
    pub fn parse(text: &str) -> Self {
        let records = text.lines().filter_map(MountRecord::parse_line).collect();
        Self { records }
    }

    pub fn records(&self) -> &[MountRecord] {
        &self.records
    }

    pub fn has_target(&self, target: &str) -> bool {
        self.records.iter().any(|r| r.target == target)
    }

    pub fn any_line_contains(&self, needle: &str) -> bool {
        self.records.iter().any(|r| r.raw.contains(needle))
    }

    /// Lines present in `new` but not in `old`.
    pub fn diff(old: &MountListing, new: &MountListing) -> MountDiff {
        let old_lines: BTreeSet<&str> = old.records.iter().map(|r| r.raw.as_str()).collect();
        let appeared = new
            .records
            .iter()
            .filter(|r| !old_lines.contains(r.raw.as_str()))
            .cloned()
            .collect();
        MountDiff {
            appeared: MountListing { records: appeared },
        }
    }
}

/// Mounts that appeared after the upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountDiff {
    pub appeared: MountListing,
}

/// The new layer must be mounted now and must not have been mounted before.
pub fn check_layer_mount(
    old: &MountListing,
    diff: &MountDiff,
    layer: &ImgbaseLayer,
) -> Option<LayoutViolation> {
    let key = layer.mount_key();
    if old.any_line_contains(&key) {
        return Some(LayoutViolation::new(
            LayoutRule::NewLayerMount,
            format!("{key} shouldn't be present in old findmnt"),
        ));
    }
    if !diff.appeared.any_line_contains(&key) {
        return Some(LayoutViolation::new(
            LayoutRule::NewLayerMount,
            format!("{key} is not mounted after the upgrade"),
        ));
    }
    None
}

/// Each optional mount is either untouched or absent before and newly mounted.
pub fn check_new_volume_mounts<S: AsRef<str>>(
    old: &MountListing,
    diff: &MountDiff,
    targets: &[S],
) -> Vec<LayoutViolation> {
    let mut violations = Vec::new();

    for target in targets.iter().map(AsRef::as_ref) {
        let in_old = old.has_target(target);
        let in_diff = diff.appeared.has_target(target);
        debug!(target, in_old, in_diff, "checking new volume mount");

        match (in_old, in_diff) {
            (true, true) => violations.push(LayoutViolation::new(
                LayoutRule::NewVolumeMounts,
                format!("{target} already exists in old findmnt, it shouldn't be changed"),
            )),
            (false, false) => violations.push(LayoutViolation::new(
                LayoutRule::NewVolumeMounts,
                format!("{target} doesn't exist in old findmnt, it should be mounted after upgrade"),
            )),
            _ => {}
        }
    }

    violations
}
