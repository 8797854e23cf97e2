//! Labeled, immutable snapshots of probe output.
//!
//! A [`Snapshot`] is either complete (every [`Probe`] present) or it does not
//! exist: [`Snapshot::new`] refuses partial maps, so rules never see a
//! half-collected phase.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SnapshotError;
use crate::probe::Probe;

/// Which side of the upgrade a snapshot was taken on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotLabel {
    /// Before the upgrade.
    Old,
    /// After the upgrade.
    New,
}

impl SnapshotLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotLabel::Old => "old",
            SnapshotLabel::New => "new",
        }
    }
}

impl std::fmt::Display for SnapshotLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SnapshotLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "old" => Ok(SnapshotLabel::Old),
            "new" => Ok(SnapshotLabel::New),
            other => Err(format!("unknown snapshot label '{other}' (expected old or new)")),
        }
    }
}

/// Raw probe output captured from one host at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    label: SnapshotLabel,
    collected_at: DateTime<Utc>,
    outputs: BTreeMap<Probe, String>,
}

impl Snapshot {
    /// Build a snapshot, rejecting maps that lack any probe.
    pub fn new(
        label: SnapshotLabel,
        collected_at: DateTime<Utc>,
        outputs: BTreeMap<Probe, String>,
    ) -> Result<Self, SnapshotError> {
        if let Some(missing) = Probe::ALL.iter().find(|p| !outputs.contains_key(p)) {
            return Err(SnapshotError::MissingProbe {
                label: label.to_string(),
                probe: missing.to_string(),
            });
        }
        Ok(Self {
            label,
            collected_at,
            outputs,
        })
    }

    /// Convenience constructor stamping the current time.
    pub fn collected_now(
        label: SnapshotLabel,
        outputs: BTreeMap<Probe, String>,
    ) -> Result<Self, SnapshotError> {
        Self::new(label, Utc::now(), outputs)
    }

    pub fn label(&self) -> SnapshotLabel {
        self.label
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    /// Output of a probe. Always present by construction.
    pub fn get(&self, probe: Probe) -> &str {
        self.outputs.get(&probe).map(String::as_str).unwrap_or_default()
    }

    /// SHA-256 over label and probe outputs in probe order, hex encoded.
    ///
    /// The collection timestamp is not part of the digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.label.as_str().as_bytes());
        hasher.update(b"\0");
        for (probe, output) in &self.outputs {
            hasher.update(probe.name().as_bytes());
            hasher.update(b"\0");
            hasher.update(output.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }

    /// Read a snapshot from a JSON file, re-validating completeness.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        let parsed: Snapshot = serde_json::from_str(&content)?;
        Self::new(parsed.label, parsed.collected_at, parsed.outputs)
    }

    /// Read a snapshot and require a specific label.
    pub fn load_labeled(path: &Path, expected: SnapshotLabel) -> Result<Self, SnapshotError> {
        let snapshot = Self::load(path)?;
        if snapshot.label != expected {
            return Err(SnapshotError::LabelMismatch {
                expected: expected.to_string(),
                actual: snapshot.label.to_string(),
            });
        }
        Ok(snapshot)
    }

    /// Write a snapshot as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// The before/after snapshots of one verification run.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPair<'a> {
    pub old: &'a Snapshot,
    pub new: &'a Snapshot,
}

impl<'a> SnapshotPair<'a> {
    pub fn new(old: &'a Snapshot, new: &'a Snapshot) -> Self {
        Self { old, new }
    }

    /// Outputs of one probe on both sides.
    pub fn probe(&self, probe: Probe) -> (&'a str, &'a str) {
        (self.old.get(probe), self.new.get(probe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn full_outputs() -> BTreeMap<Probe, String> {
        Probe::ALL
            .iter()
            .map(|p| (*p, format!("{} output", p.name())))
            .collect()
    }

    #[test]
    fn test_complete_snapshot_accepted() {
        let snap = Snapshot::collected_now(SnapshotLabel::Old, full_outputs()).unwrap();
        assert_eq!(snap.label(), SnapshotLabel::Old);
        assert_eq!(snap.get(Probe::Lvs), "lvs output");
    }

    #[test]
    fn test_partial_snapshot_rejected() {
        let mut outputs = full_outputs();
        outputs.remove(&Probe::Findmnt);
        let err = Snapshot::collected_now(SnapshotLabel::New, outputs).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingProbe { ref probe, .. } if probe == "findmnt"));
    }

    #[test]
    fn test_digest_ignores_timestamp() {
        let a = Snapshot::new(
            SnapshotLabel::Old,
            DateTime::parse_from_rfc3339("2017-05-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            full_outputs(),
        )
        .unwrap();
        let b = Snapshot::collected_now(SnapshotLabel::Old, full_outputs()).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_digest_depends_on_label() {
        let a = Snapshot::collected_now(SnapshotLabel::Old, full_outputs()).unwrap();
        let b = Snapshot::collected_now(SnapshotLabel::New, full_outputs()).unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_save_and_load_labeled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.json");
        let snap = Snapshot::collected_now(SnapshotLabel::Old, full_outputs()).unwrap();
        snap.save(&path).unwrap();

        let loaded = Snapshot::load_labeled(&path, SnapshotLabel::Old).unwrap();
        assert_eq!(loaded, snap);

        let err = Snapshot::load_labeled(&path, SnapshotLabel::New).unwrap_err();
        assert!(matches!(err, SnapshotError::LabelMismatch { .. }));
    }

    #[test]
    fn test_load_rejects_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(
            &path,
            r#"{"label":"new","collected_at":"2017-05-22T00:00:00Z","outputs":{"lvs":"x"}}"#,
        )
        .unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(SnapshotError::MissingProbe { .. })
        ));
    }

    #[test]
    fn test_label_from_str() {
        assert_eq!("old".parse::<SnapshotLabel>(), Ok(SnapshotLabel::Old));
        assert!("before".parse::<SnapshotLabel>().is_err());
    }
}
