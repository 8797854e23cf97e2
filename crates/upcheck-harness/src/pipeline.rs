//! Upgrade orchestration: collect, upgrade, reboot, collect, verify.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use upcheck_core::rules::CheckResult;
use upcheck_core::suite::{self, RollbackBaseline, SuiteVerdict};
use upcheck_core::{
    verify, BuildId, HostHealth, Probe, RollbackObservation, Snapshot, SnapshotLabel,
    SnapshotPair, VerificationReport, VerifyContext,
};
use uuid::Uuid;

use crate::collect::collect_snapshot;
use crate::config::UpcheckConfig;
use crate::error::HarnessError;
use crate::lifecycle::{enter_system, RebootFlavor};
use crate::management::{wait_host_up, ManagementPlane, PollPolicy};
use crate::observe;
use crate::reachability::ServiceProbe;
use crate::runner::CommandRunner;
use crate::upgrade::{perform_upgrade, UpgradeMethod};

pub const ROLLBACK_COMMAND: &str = "imgbase rollback";

/// What to upgrade and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeSpec {
    pub method: UpgradeMethod,
    pub source: BuildId,
    pub target: BuildId,
    /// Update rpm already present on the host, for `yum_install`.
    pub rpm_path: Option<String>,
}

/// Result of a complete upgrade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub report: VerificationReport,
    pub old: Snapshot,
    pub new: Snapshot,
    /// Marker package listing recorded before the upgrade.
    pub marker_baseline: Option<String>,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn success(&self) -> bool {
        self.report.passed()
    }

    /// Number of suites that passed.
    pub fn passed_count(&self) -> usize {
        self.report.suites.values().filter(|v| v.passed).count()
    }

    /// Number of suites that failed.
    pub fn failed_count(&self) -> usize {
        self.report.suites.values().filter(|v| !v.passed).count()
    }
}

/// Drives one host through an upgrade and verifies the result.
pub struct UpgradePipeline {
    host: String,
    runner: Arc<dyn CommandRunner>,
    service: Arc<dyn ServiceProbe>,
    plane: Option<Arc<dyn ManagementPlane>>,
    config: UpcheckConfig,
}

impl UpgradePipeline {
    pub fn new(
        host: &str,
        runner: Arc<dyn CommandRunner>,
        service: Arc<dyn ServiceProbe>,
        config: UpcheckConfig,
    ) -> Self {
        Self {
            host: host.to_string(),
            runner,
            service,
            plane: None,
            config,
        }
    }

    pub fn with_management_plane(mut self, plane: Arc<dyn ManagementPlane>) -> Self {
        self.plane = Some(plane);
        self
    }

    fn timeout(&self) -> Duration {
        self.config.harness.command_timeout()
    }

    fn host_poll(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.config.harness.host_status_max_polls,
            interval: Duration::from_secs(self.config.harness.host_status_interval_secs),
        }
    }

    /// `None` when no management plane is configured.
    async fn host_up(&self) -> Option<bool> {
        match &self.plane {
            Some(plane) => Some(wait_host_up(plane.as_ref(), &self.host, self.host_poll()).await),
            None => None,
        }
    }

    async fn health(&self) -> HostHealth {
        HostHealth {
            service_reachable: Some(self.service.reachable(&self.host).await),
            host_up: self.host_up().await,
        }
    }

    /// Execute the full upgrade flow and return the verification report.
    ///
    /// Collection, preparation, upgrade and reconnect failures abort the run.
    /// Rule failures never do; they show up in the report.
    pub async fn run(&self, spec: &UpgradeSpec) -> anyhow::Result<PipelineResult> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let runner = self.runner.as_ref();
        let checks = &self.config.checks;
        info!(
            run_id = %run_id,
            host = %self.host,
            method = %spec.method,
            source = %spec.source,
            target = %spec.target,
            "Starting upgrade run"
        );

        let old = collect_snapshot(runner, SnapshotLabel::Old, self.timeout())
            .await
            .context("Failed to collect old infos")?;

        // Preparation
        observe::write_settings_markers(runner, &checks.settings_markers, self.timeout()).await?;
        if self.host_up().await == Some(false) {
            return Err(HarnessError::HostNotUp {
                host: self.host.clone(),
                attempts: self.config.harness.host_status_max_polls,
            }
            .into());
        }
        if !self.service.reachable(&self.host).await {
            return Err(HarnessError::PreparationFailed {
                step: "management service reachability".to_string(),
                output: format!("{} does not answer", self.host),
            }
            .into());
        }
        let marker_baseline = if observe::wants_marker_baseline(checks, &spec.source) {
            Some(observe::marker_packages(runner, &checks.marker_package, self.timeout()).await)
        } else {
            None
        };

        // Upgrade and reconnect
        perform_upgrade(
            spec.method,
            runner,
            self.plane.as_deref(),
            &self.host,
            spec.rpm_path.as_deref(),
            &self.config.harness,
        )
        .await
        .context("Failed to run upgrade")?;
        enter_system(runner, spec.method.reboot_flavor(), &self.config.harness).await?;

        let new = collect_snapshot(runner, SnapshotLabel::New, self.timeout())
            .await
            .context("Failed to collect new infos")?;

        // Verify
        let ctx = VerifyContext {
            pair: SnapshotPair::new(&old, &new),
            source: &spec.source,
            target: &spec.target,
            config: checks,
            health: self.health().await,
        };
        let mut report = verify(&ctx).with_run_id(run_id.clone());

        report.insert(self.signed_check(&spec.target).await);
        let settings =
            observe::read_settings_markers(runner, &checks.settings_markers, self.timeout()).await;
        report.insert(suite::settings_check(&settings));

        match (spec.method, spec.rpm_path.as_deref()) {
            (UpgradeMethod::YumUpdate, _) => {
                let out = observe::repeat_update(runner, self.timeout()).await;
                report.insert(suite::cannot_update_check(&out.output));
            }
            (UpgradeMethod::YumInstall, Some(rpm)) => {
                let out = observe::repeat_install(runner, rpm, self.timeout()).await;
                report.insert(suite::cannot_install_check(out.success, &out.output));
            }
            _ => {}
        }

        if let Some(baseline) = &marker_baseline {
            let observed =
                observe::marker_packages(runner, &checks.marker_package, self.timeout()).await;
            match suite::usr_space_rpm_check(&spec.source, checks, baseline, &observed) {
                Ok(verdict) => report.insert(verdict),
                Err(na) => info!("{na}"),
            }
        }
        if checks.check_kernel_space_package {
            let observed = observe::kernel_space(runner, self.timeout()).await;
            match suite::knl_space_rpm_check(&spec.source, checks, &observed) {
                Ok(verdict) => report.insert(verdict),
                Err(na) => info!("{na}"),
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        if report.passed() {
            info!(run_id = %run_id, duration_ms, "Upgrade run passed");
        } else {
            warn!(run_id = %run_id, duration_ms, verdicts = ?report.verdicts(), "Upgrade run failed");
        }

        Ok(PipelineResult {
            run_id,
            report,
            old,
            new,
            marker_baseline,
            duration_ms,
        })
    }

    async fn signed_check(&self, target: &BuildId) -> SuiteVerdict {
        let out = observe::signature_report(self.runner.as_ref(), self.timeout()).await;
        if out.success {
            suite::signed_check(&out.output, target)
        } else {
            SuiteVerdict::reduce(
                suite::SIGNED_CHECK,
                vec![CheckResult::fail(
                    upcheck_core::rules::packages::SIGNED,
                    format!("signature report failed: {}", out.output.trim()),
                )],
            )
        }
    }

    /// Roll the host back to the pre-upgrade layer and verify it.
    ///
    /// Without `marker_baseline` the marker listing taken just before the rollback is the baseline.
    pub async fn rollback(
        &self,
        old: &Snapshot,
        source: &BuildId,
        marker_baseline: Option<String>,
    ) -> anyhow::Result<SuiteVerdict> {
        let runner = self.runner.as_ref();
        let checks = &self.config.checks;
        info!(host = %self.host, source = %source, "Rolling back");

        let baseline_packages = match marker_baseline {
            Some(baseline) => baseline,
            None => observe::marker_packages(runner, &checks.marker_package, self.timeout()).await,
        };

        let result = runner.run(ROLLBACK_COMMAND, self.timeout()).await;
        if !result.success {
            return Err(HarnessError::RollbackFailed {
                output: result.output,
            }
            .into());
        }
        let imgbase_w = enter_system(runner, RebootFlavor::Manual, &self.config.harness)
            .await
            .context("Host did not come back after rollback")?;

        let observation = RollbackObservation {
            imgbase_w,
            host_up: self.host_up().await,
            marker_packages: observe::marker_packages(runner, &checks.marker_package, self.timeout())
                .await,
            kernel: if checks.check_kernel_space_package {
                Some(observe::kernel_space(runner, self.timeout()).await)
            } else {
                None
            },
        };

        let baseline = RollbackBaseline {
            imgbase_w: old.get(Probe::ImgbaseW),
            marker_packages: &baseline_packages,
            source,
        };
        Ok(suite::rollback_check(&baseline, &observation, checks))
    }
}
