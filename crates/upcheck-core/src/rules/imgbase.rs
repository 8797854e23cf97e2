//! Rules over `imgbase` output and the iSCSI initiator name.

use tracing::info;

use super::{check_with, CheckResult};
use crate::build::ImgbaseLayer;
use crate::error::{FormatError, MissingDataError};
use crate::probe::Probe;
use crate::snapshot::SnapshotPair;

pub const IMGBASE_W: &str = "imgbase_w";
pub const IMGBASE_LAYOUT: &str = "imgbase_layout";
pub const IQN: &str = "iqn";

/// The layer booted after upgrade must carry a strictly newer build date.
pub fn check_imgbase_w(pair: &SnapshotPair<'_>) -> CheckResult {
    let (old, new) = pair.probe(Probe::ImgbaseW);
    check_with(IMGBASE_W, || -> Result<Vec<String>, FormatError> {
        let old_layer = ImgbaseLayer::from_imgbase_w(old)?;
        let new_layer = ImgbaseLayer::from_imgbase_w(new)?;
        info!(old = %old_layer, new = %new_layer, "comparing booted layers");

        if new_layer.build_date() > old_layer.build_date() {
            Ok(vec![])
        } else {
            Ok(vec![format!(
                "new layer {} (built {}) is not newer than old layer {} (built {})",
                new_layer,
                new_layer.build_date(),
                old_layer,
                old_layer.build_date()
            )])
        }
    })
}

/// The old layout must survive inside the new one, and each side must list its booted layer.
pub fn check_imgbase_layout(pair: &SnapshotPair<'_>) -> CheckResult {
    let (old_w, new_w) = pair.probe(Probe::ImgbaseW);
    let (old_layout, new_layout) = pair.probe(Probe::ImgbaseLayout);

    check_with(IMGBASE_LAYOUT, || -> Result<Vec<String>, MissingDataError> {
        let old_layer = last_token(old_w, "old imgbase_w")?;
        let new_layer = last_token(new_w, "new imgbase_w")?;
        let old_layout = old_layout.trim();
        let mut diagnostics = Vec::new();

        if !old_layout.contains(old_layer) {
            diagnostics.push(format!("old layer {old_layer} is not in old imgbase layout"));
        }
        if !new_layout.contains(old_layout) {
            diagnostics.push("old imgbase layout is not contained in new imgbase layout".to_string());
        }
        if !new_layout.contains(new_layer) {
            diagnostics.push(format!("new layer {new_layer} is not in new imgbase layout"));
        }
        Ok(diagnostics)
    })
}

/// The initiator name suffix (after the last `:`) is preserved.
pub fn check_iqn(pair: &SnapshotPair<'_>) -> CheckResult {
    let (old, new) = pair.probe(Probe::InitiatornameIscsi);
    check_with(IQN, || -> Result<Vec<String>, MissingDataError> {
        let old_iqn = iqn_suffix(old, "old initiatorname_iscsi")?;
        let new_iqn = iqn_suffix(new, "new initiatorname_iscsi")?;
        info!(old = old_iqn, new = new_iqn, "comparing initiator names");

        if old_iqn == new_iqn {
            Ok(vec![])
        } else {
            Ok(vec![format!("initiator name changed from {old_iqn} to {new_iqn}")])
        }
    })
}

fn last_token<'a>(output: &'a str, probe: &str) -> Result<&'a str, MissingDataError> {
    output
        .split_whitespace()
        .last()
        .ok_or_else(|| MissingDataError::EmptyOutput {
            probe: probe.to_string(),
        })
}

fn iqn_suffix<'a>(output: &'a str, probe: &str) -> Result<&'a str, MissingDataError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(MissingDataError::EmptyOutput {
            probe: probe.to_string(),
        });
    }
    Ok(trimmed.rsplit(':').next().unwrap_or(trimmed).trim())
}
