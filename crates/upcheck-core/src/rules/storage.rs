//! Logical volume and mount layout rules.

use tracing::info;

use super::{check_with, CheckResult};
use crate::build::ImgbaseLayer;
use crate::config::CheckConfig;
use crate::error::InputError;
use crate::layout::{mounts, volumes, MountListing, VolumeListing};
use crate::probe::Probe;
use crate::snapshot::SnapshotPair;

pub const LVS: &str = "lvs";
pub const FINDMNT: &str = "findmnt";

/// Volume delta: nothing but pool metadata vanished, the new layer was added,
/// optional volumes follow their rule when enabled, pool metadata was sized correctly.
pub fn check_lvs(pair: &SnapshotPair<'_>, config: &CheckConfig, new_volumes: bool) -> CheckResult {
    let (old_text, new_text) = pair.probe(Probe::Lvs);
    let (_, new_w) = pair.probe(Probe::ImgbaseW);

    check_with(LVS, || -> Result<Vec<String>, InputError> {
        let old = VolumeListing::parse(old_text)?;
        let new = VolumeListing::parse(new_text)?;
        let layer = ImgbaseLayer::from_imgbase_w(new_w)?;
        let diff = VolumeListing::diff(&old, &new);
        info!(
            vanished = diff.vanished.len(),
            added = diff.added.len(),
            layer = %layer,
            new_volumes,
            "diffing logical volumes"
        );

        let mut violations = Vec::new();
        violations.extend(volumes::check_vanished(&diff));
        violations.extend(volumes::check_layer_volumes(&diff, &layer));
        if new_volumes {
            violations.extend(volumes::check_new_volumes(&old, &diff, &config.new_volumes));
        }

        let mut diagnostics: Vec<String> = violations.iter().map(ToString::to_string).collect();
        match volumes::check_pool_metadata(&old, &new, config.tmeta_floor_mb) {
            Ok(Some(violation)) => diagnostics.push(violation.to_string()),
            Ok(None) => {}
            Err(missing) => diagnostics.push(missing.to_string()),
        }
        Ok(diagnostics)
    })
}

/// Mount delta: the new layer is freshly mounted and optional mounts follow their rule when enabled.
pub fn check_findmnt(pair: &SnapshotPair<'_>, config: &CheckConfig, new_volumes: bool) -> CheckResult {
    let (old_text, new_text) = pair.probe(Probe::Findmnt);
    let (_, new_w) = pair.probe(Probe::ImgbaseW);

    check_with(FINDMNT, || -> Result<Vec<String>, InputError> {
        let layer = ImgbaseLayer::from_imgbase_w(new_w)?;
        let old = MountListing::parse(old_text);
        let new = MountListing::parse(new_text);
        let diff = MountListing::diff(&old, &new);
        info!(appeared = diff.appeared.records().len(), key = %layer.mount_key(), "diffing mounts");

        let mut violations = Vec::new();
        violations.extend(mounts::check_layer_mount(&old, &diff, &layer));
        if new_volumes {
            violations.extend(mounts::check_new_volume_mounts(
                &old,
                &diff,
                &config.new_volume_mounts(),
            ));
        }
        Ok(violations.iter().map(ToString::to_string).collect())
    })
}
