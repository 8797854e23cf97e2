//! `lvs` listing records and volume-level rules.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{normalize_line, LayoutRule, LayoutViolation};
use crate::build::ImgbaseLayer;
use crate::config::NewVolume;
use crate::error::{FormatError, MissingDataError};

/// Name pattern of thin-pool metadata volumes (hidden volumes are bracketed by `lvs -a`).
pub const POOL_METADATA_PATTERN: &str = r"^\[?pool.*_tmeta\]?$";

/// One line of `lvs -a -o lv_name,lv_size --unit=m --noheadings`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalVolumeRecord {
    /// Volume name as printed, brackets included for hidden volumes.
    pub name: String,
    /// Size in megabytes.
    pub size_mb: f64,
    /// Size text as printed, e.g. `1024.00m`.
    pub size: String,
    /// Whitespace-normalized line.
    pub raw: String,
}

impl LogicalVolumeRecord {
    pub fn parse_line(line: &str) -> Result<Self, FormatError> {
        let raw = normalize_line(line);
        let mut fields = raw.split(' ');
        let name = fields.next().unwrap_or_default().to_string();
        let size = fields.last().ok_or_else(|| FormatError::InvalidSize {
            input: raw.clone(),
        })?;
        let size_mb = parse_size_mb(size)?;

        Ok(Self {
            name,
            size_mb,
            size: size.to_string(),
            raw: raw.clone(),
        })
    }

    pub fn is_pool_metadata(&self) -> bool {
        is_pool_metadata(&self.name)
    }

    /// Size truncated to whole megabytes.
    pub fn whole_mb(&self) -> u64 {
        self.size_mb.trunc() as u64
    }
}

fn is_pool_metadata(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(POOL_METADATA_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// Parse `1024.00m`, `<8.00m` or `2048.00M` into megabytes.
fn parse_size_mb(size: &str) -> Result<f64, FormatError> {
    let invalid = || FormatError::InvalidSize {
        input: size.to_string(),
    };
    let number = size
        .trim_start_matches('<')
        .strip_suffix(['m', 'M'])
        .ok_or_else(invalid)?;
    number.parse::<f64>().map_err(|_| invalid())
}

/// Parsed `lvs` output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeListing {
    records: Vec<LogicalVolumeRecord>,
}

impl VolumeListing {
    /// Parse a listing. Blank lines, `WARNING` lines and any line that is not a
    /// `<name> <size>` pair (LVM notices on stderr) are skipped.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let records = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter(|l| {
                let record_shaped = !l.contains("WARNING") && l.split_whitespace().count() == 2;
                if !record_shaped {
                    debug!(line = %l, "skipping non-volume line in lvs output");
                }
                record_shaped
            })
            .map(LogicalVolumeRecord::parse_line)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[LogicalVolumeRecord] {
        &self.records
    }

    pub fn find(&self, name: &str) -> Option<&LogicalVolumeRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn pool_metadata(&self) -> Option<&LogicalVolumeRecord> {
        self.records.iter().find(|r| r.is_pool_metadata())
    }

    /// Line-level set difference in both directions.
    pub fn diff(old: &VolumeListing, new: &VolumeListing) -> VolumeDiff {
        let old_lines: BTreeSet<&str> = old.records.iter().map(|r| r.raw.as_str()).collect();
        let new_lines: BTreeSet<&str> = new.records.iter().map(|r| r.raw.as_str()).collect();

        let vanished = old
            .records
            .iter()
            .filter(|r| !new_lines.contains(r.raw.as_str()))
            .cloned()
            .collect();
        let added = new
            .records
            .iter()
            .filter(|r| !old_lines.contains(r.raw.as_str()))
            .cloned()
            .collect();

        VolumeDiff { vanished, added }
    }
}

/// Volumes that disappeared (`old - new`) and appeared (`new - old`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeDiff {
    pub vanished: Vec<LogicalVolumeRecord>,
    pub added: Vec<LogicalVolumeRecord>,
}

impl VolumeDiff {
    pub fn added_named(&self, name: &str) -> Option<&LogicalVolumeRecord> {
        self.added.iter().find(|r| r.name == name)
    }
}

/// At most one volume may vanish, and only the pool metadata volume (it is resized).
pub fn check_vanished(diff: &VolumeDiff) -> Option<LayoutViolation> {
    match diff.vanished.as_slice() {
        [] => None,
        [only] if only.is_pool_metadata() => None,
        vanished => {
            let lines: Vec<&str> = vanished.iter().map(|r| r.raw.as_str()).collect();
            Some(LayoutViolation::new(
                LayoutRule::NoVanishedVolumes,
                format!("new lvs doesn't include items in old lvs: {lines:?}"),
            ))
        }
    }
}

/// The new layer must be added both in full (`+N`) and base form.
pub fn check_layer_volumes(diff: &VolumeDiff, layer: &ImgbaseLayer) -> Vec<LayoutViolation> {
    [layer.name(), layer.base()]
        .into_iter()
        .filter(|name| diff.added_named(name).is_none())
        .map(|name| {
            LayoutViolation::new(
                LayoutRule::NewLayerVolumes,
                format!("layer volume {name} was not added by the upgrade"),
            )
        })
        .collect()
}

/// Each optional volume is either present before and untouched, or absent
/// before and added with exactly its expected size.
pub fn check_new_volumes(
    old: &VolumeListing,
    diff: &VolumeDiff,
    expected: &[NewVolume],
) -> Vec<LayoutViolation> {
    let mut violations = Vec::new();

    for volume in expected {
        let in_old = old.contains(&volume.name);
        let added = diff.added_named(&volume.name);
        debug!(volume = %volume.name, in_old, added = added.is_some(), "checking new volume");

        match (in_old, added) {
            (true, Some(record)) => violations.push(LayoutViolation::new(
                LayoutRule::NewVolumes,
                format!(
                    "{} already exists in old layer, it shouldn't be changed in new layer (now '{}')",
                    volume.name, record.raw
                ),
            )),
            (false, None) => violations.push(LayoutViolation::new(
                LayoutRule::NewVolumes,
                format!(
                    "{} doesn't exist in old layer, it should be added in new layer",
                    volume.name
                ),
            )),
            (false, Some(record)) if record.size != volume.size => {
                violations.push(LayoutViolation::new(
                    LayoutRule::NewVolumes,
                    format!(
                        "{} is added in new layer, but its size {} is not equal to the desired {}",
                        volume.name, record.size, volume.size
                    ),
                ))
            }
            _ => {}
        }
    }

    violations
}

/// Pool metadata below `floor_mb` must grow to exactly the floor; otherwise it must not change.
pub fn check_pool_metadata(
    old: &VolumeListing,
    new: &VolumeListing,
    floor_mb: u64,
) -> Result<Option<LayoutViolation>, MissingDataError> {
    let missing = |listing: &str| MissingDataError::PatternNotFound {
        pattern: POOL_METADATA_PATTERN.to_string(),
        listing: listing.to_string(),
    };
    let old_mb = old.pool_metadata().ok_or_else(|| missing("old lvs"))?.whole_mb();
    let new_mb = new.pool_metadata().ok_or_else(|| missing("new lvs"))?.whole_mb();
    debug!(old_mb, new_mb, floor_mb, "checking pool metadata size");

    let violation = if old_mb < floor_mb {
        (new_mb != floor_mb).then(|| {
            LayoutViolation::new(
                LayoutRule::PoolMetadataSize,
                format!(
                    "old pool metadata is {old_mb}M (below {floor_mb}M) but new one is {new_mb}M, expected {floor_mb}M"
                ),
            )
        })
    } else {
        (new_mb != old_mb).then(|| {
            LayoutViolation::new(
                LayoutRule::PoolMetadataSize,
                format!(
                    "old pool metadata is {old_mb}M (at least {floor_mb}M) but new one is {new_mb}M, expected it unchanged"
                ),
            )
        })
    };
    Ok(violation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(text: &str) -> VolumeListing {
        VolumeListing::parse(text).unwrap()
    }

    #[test]
    fn test_parse_line() {
        let record = LogicalVolumeRecord::parse_line("  [pool00_tmeta]   1024.00m").unwrap();
        assert_eq!(record.name, "[pool00_tmeta]");
        assert_eq!(record.size, "1024.00m");
        assert_eq!(record.raw, "[pool00_tmeta] 1024.00m");
        assert!(record.is_pool_metadata());
        assert_eq!(record.whole_mb(), 1024);
    }

    #[test]
    fn test_parse_rounded_size() {
        let record = LogicalVolumeRecord::parse_line("swap <7.88m").unwrap();
        assert_eq!(record.whole_mb(), 7);
        assert!(!record.is_pool_metadata());
    }

    #[test]
    fn test_parse_line_rejects_other_units() {
        assert!(matches!(
            LogicalVolumeRecord::parse_line("root 8.00g"),
            Err(FormatError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_listing_skips_warnings_and_blanks() {
        let l = listing(
            "  WARNING: Not using lvmetad because config setting use_lvmetad=0.\r\n\
             \r\n\
             root 6144.00m\r\n\
             swap 4096.00m\r\n",
        );
        assert_eq!(l.records().len(), 2);
        assert!(l.contains("root"));
    }

    #[test]
    fn test_listing_skips_stderr_notices() {
        let l = listing(
            "File descriptor 7 (/dev/pts/0) leaked on lvs invocation. Parent PID 4242: bash\n  \
             root 6144.00m\n  [pool00_tmeta] 1024.00m\n",
        );
        assert_eq!(l.records().len(), 2);
        assert!(l.contains("root"));
        assert_eq!(l.pool_metadata().map(|r| r.whole_mb()), Some(1024));
    }

    #[test]
    fn test_listing_rejects_record_with_bad_size() {
        assert!(matches!(
            VolumeListing::parse("root 6144.00m\nswap 4.00g\n"),
            Err(FormatError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_diff_directions() {
        let old = listing("a 1.00m\nb 2.00m");
        let new = listing("a 1.00m\nc 3.00m");
        let diff = VolumeListing::diff(&old, &new);
        assert_eq!(diff.vanished.len(), 1);
        assert_eq!(diff.vanished[0].name, "b");
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "c");
    }

    #[test]
    fn test_only_resized_metadata_may_vanish() {
        let old = listing("A 1.00m\nB 2.00m\n[pool1_tmeta] 900.00m");
        let new = listing("A 1.00m\nB 2.00m\n[pool1_tmeta] 1024.00m");
        assert!(check_vanished(&VolumeListing::diff(&old, &new)).is_none());

        let old = listing("A 1.00m\nB 2.00m\npool1_tmeta 900.00m");
        let new = listing("A 1.00m\nB 2.00m\npool1_tmeta 1024.00m");
        assert!(check_vanished(&VolumeListing::diff(&old, &new)).is_none());
    }

    #[test]
    fn test_removed_volume_rejected() {
        let old = listing("A 1.00m\nB 2.00m");
        let new = listing("A 1.00m");
        let violation = check_vanished(&VolumeListing::diff(&old, &new)).unwrap();
        assert_eq!(violation.rule, LayoutRule::NoVanishedVolumes);
        assert!(violation.reason.contains("B 2.00m"));
    }

    #[test]
    fn test_two_vanished_rejected_even_with_metadata() {
        let old = listing("B 2.00m\n[pool1_tmeta] 900.00m");
        let new = listing("[pool1_tmeta] 1024.00m");
        assert!(check_vanished(&VolumeListing::diff(&old, &new)).is_some());
    }

    #[test]
    fn test_pool_metadata_floor() {
        let floor = 1024;
        let cases = [
            ("2048.00m", "2048.00m", true),
            ("2048.00m", "1024.00m", false),
            ("512.00m", "1024.00m", true),
            ("512.00m", "512.00m", false),
            ("1024.00m", "1024.00m", true),
        ];
        for (old_size, new_size, ok) in cases {
            let old = listing(&format!("[pool00_tmeta] {old_size}"));
            let new = listing(&format!("[pool00_tmeta] {new_size}"));
            let result = check_pool_metadata(&old, &new, floor).unwrap();
            assert_eq!(result.is_none(), ok, "{old_size} -> {new_size}");
        }
    }

    #[test]
    fn test_pool_metadata_missing() {
        let old = listing("root 1.00m");
        let new = listing("[pool00_tmeta] 1024.00m");
        assert!(matches!(
            check_pool_metadata(&old, &new, 1024),
            Err(MissingDataError::PatternNotFound { ref listing, .. }) if listing == "old lvs"
        ));
    }
}
