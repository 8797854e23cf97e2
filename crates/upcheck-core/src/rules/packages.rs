//! Package version and signature rules.

use tracing::info;

use super::{check_with, CheckResult};
use crate::build::BuildId;
use crate::error::FormatError;
use crate::probe::Probe;
use crate::snapshot::SnapshotPair;
use crate::version::{check_monotonic, Monotonicity, VersionToken};

pub const IMGBASED_VER: &str = "imgbased_ver";
pub const UPDATE_VER: &str = "update_ver";
pub const SIGNED: &str = "signed";

/// Marker rpm prints next to a signed package.
pub const SIGNED_MARKER: &str = "Key ID";

/// The installed imgbased version must not go backwards in any component.
pub fn check_imgbased_ver(pair: &SnapshotPair<'_>) -> CheckResult {
    let (old, new) = pair.probe(Probe::ImgbasedVer);
    check_with(IMGBASED_VER, || -> Result<Vec<String>, FormatError> {
        let old_ver = VersionToken::from_package(old)?;
        let new_ver = VersionToken::from_package(new)?;
        info!(old = %old_ver, new = %new_ver, "comparing imgbased versions");

        match check_monotonic(&old_ver, &new_ver)? {
            Monotonicity::NonDecreasing => Ok(vec![]),
            Monotonicity::Regressed { index, old, new } => Ok(vec![format!(
                "imgbased {old_ver} -> {new_ver} regressed at component {index}: {old} > {new}"
            )]),
        }
    })
}

/// Before upgrade the placeholder update package is installed; after it the target's.
pub fn check_update_ver(pair: &SnapshotPair<'_>, target: &BuildId, placeholder: &str) -> CheckResult {
    let (old, new) = pair.probe(Probe::UpdateVer);
    let suffix = target.version_suffix();
    info!(placeholder, target = %suffix, "checking update package");

    let mut diagnostics = Vec::new();
    if !old.contains(placeholder) {
        diagnostics.push(format!(
            "old update package '{}' is not the {placeholder} package",
            old.trim()
        ));
    }
    if !new.contains(&suffix) {
        diagnostics.push(format!(
            "new update package '{}' does not carry target version {suffix}",
            new.trim()
        ));
    }
    CheckResult::from_diagnostics(UPDATE_VER, diagnostics)
}

/// Every package in the signature report is signed, except the applied update package.
pub fn check_signed(report: &str, target: &BuildId) -> CheckResult {
    let update_package = format!("update-{}", target.version_suffix());
    let unsigned: Vec<String> = report
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.contains(SIGNED_MARKER) && !l.contains(&update_package))
        .map(|l| format!("unsigned package: {l}"))
        .collect();
    info!(unsigned = unsigned.len(), "checked package signatures");
    CheckResult::from_diagnostics(SIGNED, unsigned)
}
