//! End-to-end verification over realistic before/after snapshots.

use std::collections::BTreeMap;

use upcheck_core::layout::volumes::{check_new_volumes, check_vanished};
use upcheck_core::layout::VolumeListing;
use upcheck_core::{
    verify, BuildId, CheckConfig, HostHealth, Probe, Snapshot, SnapshotLabel, SnapshotPair,
    VerifyContext,
};

const SOURCE: &str = "redhat-virtualization-host-4.1-20170421.0";
const TARGET: &str = "redhat-virtualization-host-4.1-20170522.0";

fn outputs(pairs: &[(Probe, &str)]) -> BTreeMap<Probe, String> {
    pairs.iter().map(|(p, s)| (*p, s.to_string())).collect()
}

fn old_snapshot() -> Snapshot {
    Snapshot::collected_now(
        SnapshotLabel::Old,
        outputs(&[
            (Probe::ImgbasedVer, "imgbased-0.9.23-0.1.el7ev.noarch\n"),
            (
                Probe::UpdateVer,
                "redhat-virtualization-host-image-update-placeholder-4.1-2.0.el7.noarch\n",
            ),
            (Probe::ImgbaseW, "You are on rhvh-4.1-0.20170421.0+1\n"),
            (
                Probe::ImgbaseLayout,
                "rhvh-4.1-0.20170421.0\n +- rhvh-4.1-0.20170421.0+1\n",
            ),
            (
                Probe::InitiatornameIscsi,
                "InitiatorName=iqn.1994-05.com.redhat:9e3f2c7d1a\n",
            ),
            (
                Probe::Lvs,
                "  pool00 93696.00m\n  [pool00_tdata] 93696.00m\n  [pool00_tmeta] 96.00m\n  \
                 rhvh-4.1-0.20170421.0 66048.00m\n  rhvh-4.1-0.20170421.0+1 66048.00m\n  \
                 root 66048.00m\n  swap 7936.00m\n  var 15360.00m\n",
            ),
            (
                Probe::Findmnt,
                "/ /dev/mapper/rhvh-rhvh--4.1--0.20170421.0+1 ext4 rw,relatime,discard\n\
                 /boot /dev/sda1 ext4 rw,relatime\n\
                 /var /dev/mapper/rhvh-var ext4 rw,relatime,discard\n",
            ),
        ]),
    )
    .unwrap()
}

fn new_snapshot(imgbase_w: &str) -> Snapshot {
    Snapshot::collected_now(
        SnapshotLabel::New,
        outputs(&[
            (Probe::ImgbasedVer, "imgbased-0.9.27-0.1.el7ev.noarch\n"),
            (
                Probe::UpdateVer,
                "redhat-virtualization-host-image-update-4.1-20170522.0.el7_3.noarch\n",
            ),
            (Probe::ImgbaseW, imgbase_w),
            (
                Probe::ImgbaseLayout,
                "rhvh-4.1-0.20170421.0\n +- rhvh-4.1-0.20170421.0+1\n\
                 rhvh-4.1-0.20170522.0\n +- rhvh-4.1-0.20170522.0+1\n",
            ),
            (
                Probe::InitiatornameIscsi,
                "InitiatorName=iqn.1994-05.com.redhat:9e3f2c7d1a\n",
            ),
            (
                Probe::Lvs,
                "  pool00 93696.00m\n  [pool00_tdata] 93696.00m\n  [pool00_tmeta] 1024.00m\n  \
                 rhvh-4.1-0.20170421.0 66048.00m\n  rhvh-4.1-0.20170421.0+1 66048.00m\n  \
                 rhvh-4.1-0.20170522.0 66048.00m\n  rhvh-4.1-0.20170522.0+1 66048.00m\n  \
                 root 66048.00m\n  swap 7936.00m\n  var 15360.00m\n",
            ),
            (
                Probe::Findmnt,
                "/ /dev/mapper/rhvh-rhvh--4.1--0.20170522.0+1 ext4 rw,relatime,discard\n\
                 /boot /dev/sda1 ext4 rw,relatime\n\
                 /var /dev/mapper/rhvh-var ext4 rw,relatime,discard\n",
            ),
        ]),
    )
    .unwrap()
}

fn run(new: &Snapshot) -> upcheck_core::VerificationReport {
    let old = old_snapshot();
    let source = BuildId::parse(SOURCE).unwrap();
    let target = BuildId::parse(TARGET).unwrap();
    let config = CheckConfig::default();
    let ctx = VerifyContext {
        pair: SnapshotPair::new(&old, new),
        source: &source,
        target: &target,
        config: &config,
        health: HostHealth::observed(true, true),
    };
    verify(&ctx)
}

#[test]
fn test_clean_upgrade_passes_every_suite() {
    let new = new_snapshot("You are on rhvh-4.1-0.20170522.0+1\n");
    let report = run(&new);
    for verdict in report.suites.values() {
        assert!(verdict.passed, "{}: {:?}", verdict.suite, verdict.checks);
    }
    assert!(report.passed());
}

#[test]
fn test_same_layer_fails_basic_check() {
    let new = new_snapshot("You are on rhvh-4.1-0.20170421.0+1\n");
    let report = run(&new);
    let verdicts = report.verdicts();
    assert_eq!(verdicts["basic_upgrade_check"], false);
    assert_eq!(verdicts["packages_check"], true);

    let basic = &report.suites["basic_upgrade_check"];
    let imgbase_w = basic.checks.iter().find(|c| c.name == "imgbase_w").unwrap();
    assert!(!imgbase_w.passed);
}

#[test]
fn test_verdicts_are_deterministic() {
    let new = new_snapshot("You are on rhvh-4.1-0.20170421.0+1\n");
    let first = run(&new);
    let second = run(&new);
    assert_eq!(first.verdicts(), second.verdicts());
    assert_eq!(first.suites, second.suites);
    assert_eq!(first.new_digest, second.new_digest);
}

#[test]
fn test_new_volume_tmp_cases() {
    let expected = CheckConfig::default()
        .new_volumes
        .into_iter()
        .filter(|v| v.name == "tmp")
        .collect::<Vec<_>>();
    let lacking = VolumeListing::parse("root 6144.00m").unwrap();

    let added = VolumeListing::parse("root 6144.00m\ntmp 1024.00m").unwrap();
    let diff = VolumeListing::diff(&lacking, &added);
    assert!(check_new_volumes(&lacking, &diff, &expected).is_empty());

    let undersized = VolumeListing::parse("root 6144.00m\ntmp 512.00m").unwrap();
    let diff = VolumeListing::diff(&lacking, &undersized);
    let violations = check_new_volumes(&lacking, &diff, &expected);
    assert_eq!(violations.len(), 1);
    assert!(violations[0].reason.contains("not equal to the desired 1024.00m"));

    let having = VolumeListing::parse("root 6144.00m\ntmp 1024.00m").unwrap();
    let changed = VolumeListing::parse("root 6144.00m\ntmp 2048.00m").unwrap();
    let diff = VolumeListing::diff(&having, &changed);
    let violations = check_new_volumes(&having, &diff, &expected);
    assert_eq!(violations.len(), 1);
    assert!(violations[0].reason.contains("shouldn't be changed"));
    // The resized tmp line also vanished from the old listing.
    assert!(check_vanished(&diff).is_some());
}

#[test]
fn test_snapshot_file_round_trip_keeps_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.json");
    let old = old_snapshot();
    old.save(&path).unwrap();

    let loaded = Snapshot::load_labeled(&path, SnapshotLabel::Old).unwrap();
    assert_eq!(loaded.digest(), old.digest());
}
