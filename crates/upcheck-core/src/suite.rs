//! Aggregate check suites.
//!
//! A suite evaluates every member rule before reducing, so each failure is
//! logged even when an earlier member already failed. The verdict is the
//! logical AND of the members.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::build::BuildId;
use crate::config::{CheckConfig, SettingsMarker};
use crate::error::NotApplicable;
use crate::rules::{host, imgbase, packages, rollback, storage, CheckResult, HostHealth, RollbackObservation};
use crate::snapshot::SnapshotPair;

pub const BASIC_UPGRADE_CHECK: &str = "basic_upgrade_check";
pub const PACKAGES_CHECK: &str = "packages_check";
pub const CMDS_CHECK: &str = "cmds_check";
pub const SIGNED_CHECK: &str = "signed_check";
pub const SETTINGS_CHECK: &str = "settings_check";
pub const ROLLBACK_CHECK: &str = "rollback_check";
pub const CANNOT_UPDATE_CHECK: &str = "cannot_update_check";
pub const CANNOT_INSTALL_CHECK: &str = "cannot_install_check";
pub const KNL_SPACE_RPM_CHECK: &str = "knl_space_rpm_check";
pub const USR_SPACE_RPM_CHECK: &str = "usr_space_rpm_check";

/// Reduced outcome of one suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteVerdict {
    pub suite: String,
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub message: String,
}

impl SuiteVerdict {
    /// AND-reduce already evaluated checks.
    pub fn reduce(suite: &str, checks: Vec<CheckResult>) -> Self {
        let failed = checks.iter().filter(|c| !c.passed).count();
        let passed = failed == 0;
        let message = if passed {
            format!("All {} checks passed", checks.len())
        } else {
            format!("{failed} of {} checks failed", checks.len())
        };

        if passed {
            info!(suite, checks = checks.len(), "suite passed");
        } else {
            warn!(suite, failed, checks = checks.len(), "suite failed");
        }

        Self {
            suite: suite.to_string(),
            passed,
            checks,
            message,
        }
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Everything the snapshot-based suites read.
#[derive(Debug, Clone, Copy)]
pub struct VerifyContext<'a> {
    pub pair: SnapshotPair<'a>,
    pub source: &'a BuildId,
    pub target: &'a BuildId,
    pub config: &'a CheckConfig,
    pub health: HostHealth,
}

impl VerifyContext<'_> {
    pub fn new_volumes_enabled(&self) -> bool {
        self.config.new_volumes_enabled(self.source, self.target)
    }
}

pub fn basic_upgrade_check(ctx: &VerifyContext<'_>) -> SuiteVerdict {
    let checks = vec![
        imgbase::check_imgbase_w(&ctx.pair),
        imgbase::check_imgbase_layout(&ctx.pair),
        host::check_service_reachable(&ctx.health),
        host::check_host_status(ctx.health.host_up),
        imgbase::check_iqn(&ctx.pair),
    ];
    SuiteVerdict::reduce(BASIC_UPGRADE_CHECK, checks)
}

pub fn packages_check(ctx: &VerifyContext<'_>) -> SuiteVerdict {
    let checks = vec![
        packages::check_imgbased_ver(&ctx.pair),
        packages::check_update_ver(&ctx.pair, ctx.target, &ctx.config.update_placeholder),
    ];
    SuiteVerdict::reduce(PACKAGES_CHECK, checks)
}

pub fn cmds_check(ctx: &VerifyContext<'_>) -> SuiteVerdict {
    let new_volumes = ctx.new_volumes_enabled();
    let checks = vec![
        storage::check_lvs(&ctx.pair, ctx.config, new_volumes),
        storage::check_findmnt(&ctx.pair, ctx.config, new_volumes),
    ];
    SuiteVerdict::reduce(CMDS_CHECK, checks)
}

pub fn signed_check(report: &str, target: &BuildId) -> SuiteVerdict {
    SuiteVerdict::reduce(SIGNED_CHECK, vec![packages::check_signed(report, target)])
}

/// `observed` pairs each marker with the file content read after upgrade.
pub fn settings_check(observed: &[(SettingsMarker, String)]) -> SuiteVerdict {
    let checks = observed
        .iter()
        .map(|(marker, content)| host::check_settings_marker(marker, content))
        .collect();
    SuiteVerdict::reduce(SETTINGS_CHECK, checks)
}

pub fn cannot_update_check(output: &str) -> SuiteVerdict {
    SuiteVerdict::reduce(CANNOT_UPDATE_CHECK, vec![host::check_cannot_update(output)])
}

pub fn cannot_install_check(success: bool, output: &str) -> SuiteVerdict {
    SuiteVerdict::reduce(
        CANNOT_INSTALL_CHECK,
        vec![host::check_cannot_install(success, output)],
    )
}

/// Baseline recorded before the upgrade that rollback must restore.
#[derive(Debug, Clone, Copy)]
pub struct RollbackBaseline<'a> {
    /// `imgbase w` from the old snapshot.
    pub imgbase_w: &'a str,
    /// Marker package listing recorded before upgrade.
    pub marker_packages: &'a str,
    pub source: &'a BuildId,
}

/// Marker-package and kernel-module checks are skipped for 4.0 sources, which cannot persist packages.
pub fn rollback_check(
    baseline: &RollbackBaseline<'_>,
    observed: &RollbackObservation,
    config: &CheckConfig,
) -> SuiteVerdict {
    let mut checks = vec![
        rollback::check_rollback_layer(baseline.imgbase_w, &observed.imgbase_w),
        host::check_host_status(observed.host_up),
    ];

    if !persistence_unsupported(baseline.source) {
        if config.check_kernel_space_package {
            checks.push(match &observed.kernel {
                Some(kernel) => rollback::check_kernel_space_rpm(config, kernel),
                None => CheckResult::fail(
                    rollback::KNL_SPACE_RPM,
                    "kernel space listings were not collected",
                ),
            });
        }
        checks.push(rollback::check_user_space_rpm(
            &config.marker_package,
            baseline.marker_packages,
            &observed.marker_packages,
        ));
    }

    SuiteVerdict::reduce(ROLLBACK_CHECK, checks)
}

pub fn usr_space_rpm_check(
    source: &BuildId,
    config: &CheckConfig,
    baseline: &str,
    observed: &str,
) -> Result<SuiteVerdict, NotApplicable> {
    require_persistence(USR_SPACE_RPM_CHECK, source)?;
    Ok(SuiteVerdict::reduce(
        USR_SPACE_RPM_CHECK,
        vec![rollback::check_user_space_rpm(
            &config.marker_package,
            baseline,
            observed,
        )],
    ))
}

pub fn knl_space_rpm_check(
    source: &BuildId,
    config: &CheckConfig,
    observed: &rollback::KernelSpaceObservation,
) -> Result<SuiteVerdict, NotApplicable> {
    require_persistence(KNL_SPACE_RPM_CHECK, source)?;
    Ok(SuiteVerdict::reduce(
        KNL_SPACE_RPM_CHECK,
        vec![rollback::check_kernel_space_rpm(config, observed)],
    ))
}

/// 4.0 hosts do not persist installed packages across layers.
pub fn persistence_unsupported(source: &BuildId) -> bool {
    source.is_release(4, 0)
}

fn require_persistence(check: &str, source: &BuildId) -> Result<(), NotApplicable> {
    if persistence_unsupported(source) {
        return Err(NotApplicable {
            check: check.to_string(),
            reason: format!("source build {source} is 4.0"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Probe;
    use crate::rules::fixtures::snapshot;
    use crate::snapshot::SnapshotLabel;

    fn build(s: &str) -> BuildId {
        BuildId::parse(s).unwrap()
    }

    #[test]
    fn test_reduce_is_and_over_all_members() {
        let verdict = SuiteVerdict::reduce(
            "demo",
            vec![
                CheckResult::fail("a", "broken"),
                CheckResult::pass("b"),
                CheckResult::fail("c", "broken too"),
            ],
        );
        assert!(!verdict.passed);
        assert_eq!(verdict.checks.len(), 3);
        assert_eq!(verdict.failed_checks().count(), 2);
        assert_eq!(verdict.message, "2 of 3 checks failed");
    }

    #[test]
    fn test_basic_suite_evaluates_every_member() {
        let old = snapshot(SnapshotLabel::Old, &[]);
        let new = snapshot(SnapshotLabel::New, &[]);
        let source = build("redhat-virtualization-host-4.1-20170421.0");
        let target = build("redhat-virtualization-host-4.1-20170522.0");
        let config = CheckConfig::default();
        let ctx = VerifyContext {
            pair: SnapshotPair::new(&old, &new),
            source: &source,
            target: &target,
            config: &config,
            health: HostHealth::observed(false, true),
        };

        let verdict = basic_upgrade_check(&ctx);
        assert!(!verdict.passed);
        assert_eq!(verdict.checks.len(), 5);
        let names: Vec<&str> = verdict.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["imgbase_w", "imgbase_layout", "service_reachable", "host_status", "iqn"]
        );
    }

    #[test]
    fn test_rollback_skips_persistence_for_4_0() {
        let source = build("redhat-virtualization-host-4.0-20170307.1");
        let baseline = RollbackBaseline {
            imgbase_w: "You are on rhvh-4.0-0.20170307.0+1",
            marker_packages: "",
            source: &source,
        };
        let observed = RollbackObservation {
            imgbase_w: "You are on rhvh-4.0-0.20170307.0+1\n".to_string(),
            host_up: None,
            ..Default::default()
        };
        let verdict = rollback_check(&baseline, &observed, &CheckConfig::default());
        assert!(verdict.passed);
        assert_eq!(verdict.checks.len(), 2);
    }

    #[test]
    fn test_rollback_kernel_toggle() {
        let source = build("redhat-virtualization-host-4.1-20170421.0");
        let baseline = RollbackBaseline {
            imgbase_w: "You are on rhvh-4.1-0.20170421.0+1",
            marker_packages: "httpd-2.4.6-45.el7.x86_64",
            source: &source,
        };
        let observed = RollbackObservation {
            imgbase_w: "You are on rhvh-4.1-0.20170421.0+1".to_string(),
            host_up: Some(true),
            marker_packages: "httpd-2.4.6-45.el7.x86_64".to_string(),
            kernel: None,
        };

        let mut config = CheckConfig::default();
        let verdict = rollback_check(&baseline, &observed, &config);
        assert!(verdict.passed);
        assert_eq!(verdict.checks.len(), 3);

        config.check_kernel_space_package = true;
        let verdict = rollback_check(&baseline, &observed, &config);
        assert!(!verdict.passed);
        assert_eq!(verdict.checks.len(), 4);
    }

    #[test]
    fn test_standalone_rpm_checks_not_applicable_on_4_0() {
        let source = build("redhat-virtualization-host-4.0-20170307.1");
        let config = CheckConfig::default();
        let err = usr_space_rpm_check(&source, &config, "", "").unwrap_err();
        assert_eq!(err.check, USR_SPACE_RPM_CHECK);
        assert!(knl_space_rpm_check(&source, &config, &Default::default()).is_err());
    }

    #[test]
    fn test_packages_suite_names() {
        let old = snapshot(
            SnapshotLabel::Old,
            &[
                (Probe::ImgbasedVer, "imgbased-0.9.27-0.1.el7ev.noarch"),
                (Probe::UpdateVer, "redhat-virtualization-host-image-update-placeholder-4.1-2.el7.noarch"),
            ],
        );
        let new = snapshot(
            SnapshotLabel::New,
            &[
                (Probe::ImgbasedVer, "imgbased-0.9.30-0.1.el7ev.noarch"),
                (Probe::UpdateVer, "redhat-virtualization-host-image-update-4.1-20170522.0.el7_3.noarch"),
            ],
        );
        let source = build("redhat-virtualization-host-4.1-20170421.0");
        let target = build("redhat-virtualization-host-4.1-20170522.0");
        let config = CheckConfig::default();
        let ctx = VerifyContext {
            pair: SnapshotPair::new(&old, &new),
            source: &source,
            target: &target,
            config: &config,
            health: HostHealth::default(),
        };
        assert!(packages_check(&ctx).passed);
    }
}
