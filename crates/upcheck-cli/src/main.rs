//! upcheck - RHVH upgrade state-diff verification CLI
//!
//! ## Commands
//!
//! - `verify`: Evaluate the suites over two captured snapshots
//! - `collect`: Capture a snapshot from a host over SSH
//! - `run`: Drive a host through a full upgrade and verify it
//! - `rollback`: Roll a host back to its previous layer and verify it

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use upcheck_core::suite::{self, SuiteVerdict};
use upcheck_core::telemetry::{init_tracing, level_for};
use upcheck_core::{
    verify, BuildId, HostHealth, Snapshot, SnapshotLabel, SnapshotPair, VerificationReport,
    VerifyContext,
};
use upcheck_harness::{
    collect_snapshot, HttpServiceProbe, SshRunner, UpcheckConfig, UpgradeMethod, UpgradePipeline,
    UpgradeSpec,
};

#[derive(Parser)]
#[command(name = "upcheck")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "RHVH upgrade state-diff verification", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the verification suites over two captured snapshots
    Verify {
        /// Snapshot taken before the upgrade (JSON)
        #[arg(long)]
        old: PathBuf,

        /// Snapshot taken after the upgrade (JSON)
        #[arg(long)]
        new: PathBuf,

        /// Build the host was upgraded from
        #[arg(long)]
        source_build: BuildId,

        /// Build the host was upgraded to
        #[arg(long)]
        target_build: BuildId,

        /// Check configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Whether the management web service answered after the upgrade
        #[arg(long)]
        service_reachable: Option<bool>,

        /// Whether the management plane reported the host as up
        #[arg(long)]
        host_up: Option<bool>,

        /// Captured package signature report to check as well
        #[arg(long)]
        signature_report: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Capture a snapshot from a host
    Collect {
        /// Host to collect from
        #[arg(long)]
        host: String,

        /// SSH user
        #[arg(short, long, default_value = "root")]
        user: String,

        /// Snapshot label (old or new)
        #[arg(short, long)]
        label: SnapshotLabel,

        /// Where to write the snapshot (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Upgrade a host and verify the result
    Run {
        /// Host to upgrade
        #[arg(long)]
        host: String,

        /// SSH user
        #[arg(short, long, default_value = "root")]
        user: String,

        /// Upgrade method (yum-update, yum-install, rhvm-upgrade)
        #[arg(short, long)]
        method: UpgradeMethod,

        #[arg(long)]
        source_build: BuildId,

        #[arg(long)]
        target_build: BuildId,

        /// Update rpm on the host, for yum-install
        #[arg(long)]
        rpm_path: Option<String>,

        /// Configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Roll a host back to its pre-upgrade layer and verify it
    Rollback {
        /// Host to roll back
        #[arg(long)]
        host: String,

        /// SSH user
        #[arg(short, long, default_value = "root")]
        user: String,

        /// Snapshot taken before the upgrade (JSON)
        #[arg(long)]
        old: PathBuf,

        #[arg(long)]
        source_build: BuildId,

        /// Marker package listing recorded before the upgrade
        #[arg(long)]
        marker_baseline: Option<PathBuf>,

        /// Configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
}

struct VerifyArgs<'a> {
    old: &'a Path,
    new: &'a Path,
    source: &'a BuildId,
    target: &'a BuildId,
    config: Option<&'a Path>,
    health: HostHealth,
    signature_report: Option<&'a Path>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, level_for(cli.verbose));

    match cli.command {
        Commands::Verify {
            old,
            new,
            source_build,
            target_build,
            config,
            service_reachable,
            host_up,
            signature_report,
            json,
        } => {
            let report = cmd_verify(&VerifyArgs {
                old: &old,
                new: &new,
                source: &source_build,
                target: &target_build,
                config: config.as_deref(),
                health: HostHealth {
                    service_reachable,
                    host_up,
                },
                signature_report: signature_report.as_deref(),
            })?;
            print_report(&report, json)?;
            finish(report.passed())
        }
        Commands::Collect {
            host,
            user,
            label,
            output,
            config,
        } => cmd_collect(&host, &user, label, &output, config.as_deref()).await,
        Commands::Run {
            host,
            user,
            method,
            source_build,
            target_build,
            rpm_path,
            config,
            json,
        } => {
            let spec = UpgradeSpec {
                method,
                source: source_build,
                target: target_build,
                rpm_path,
            };
            cmd_run(&host, &user, &spec, config.as_deref(), json).await
        }
        Commands::Rollback {
            host,
            user,
            old,
            source_build,
            marker_baseline,
            config,
            json,
        } => {
            cmd_rollback(
                &host,
                &user,
                &old,
                &source_build,
                marker_baseline.as_deref(),
                config.as_deref(),
                json,
            )
            .await
        }
    }
}

/// Offline evaluation of two snapshot files.
fn cmd_verify(args: &VerifyArgs<'_>) -> Result<VerificationReport> {
    let config = UpcheckConfig::load_or_default(args.config).context("Failed to load config")?;
    let old = Snapshot::load_labeled(args.old, SnapshotLabel::Old)
        .with_context(|| format!("Failed to load old snapshot {}", args.old.display()))?;
    let new = Snapshot::load_labeled(args.new, SnapshotLabel::New)
        .with_context(|| format!("Failed to load new snapshot {}", args.new.display()))?;

    let ctx = VerifyContext {
        pair: SnapshotPair::new(&old, &new),
        source: args.source,
        target: args.target,
        config: &config.checks,
        health: args.health,
    };
    let mut report = verify(&ctx);

    if let Some(path) = args.signature_report {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signature report {}", path.display()))?;
        report.insert(suite::signed_check(&text, args.target));
    }
    Ok(report)
}

async fn cmd_collect(
    host: &str,
    user: &str,
    label: SnapshotLabel,
    output: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let config = UpcheckConfig::load_or_default(config).context("Failed to load config")?;
    let runner = SshRunner::new(host, user);
    let snapshot = collect_snapshot(&runner, label, config.harness.command_timeout())
        .await
        .with_context(|| format!("Failed to collect {label} snapshot from {host}"))?;
    snapshot
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Snapshot: {}", output.display());
    println!("Digest: {}", snapshot.digest());
    Ok(())
}

fn pipeline(host: &str, user: &str, config: UpcheckConfig) -> Result<UpgradePipeline> {
    let service = HttpServiceProbe::new(config.harness.service_port)
        .context("Failed to build management service probe")?;
    Ok(UpgradePipeline::new(
        host,
        Arc::new(SshRunner::new(host, user)),
        Arc::new(service),
        config,
    ))
}

async fn cmd_run(
    host: &str,
    user: &str,
    spec: &UpgradeSpec,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = UpcheckConfig::load_or_default(config).context("Failed to load config")?;
    info!(host, method = %spec.method, "starting upgrade run");

    let result = pipeline(host, user, config)?
        .run(spec)
        .await
        .context("Upgrade run aborted")?;

    print_report(&result.report, json)?;
    if !json {
        println!("Duration: {}ms", result.duration_ms);
        println!(
            "Summary: {}/{} suites passed",
            result.passed_count(),
            result.report.suites.len()
        );
    }
    finish(result.success())
}

async fn cmd_rollback(
    host: &str,
    user: &str,
    old: &Path,
    source: &BuildId,
    marker_baseline: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = UpcheckConfig::load_or_default(config).context("Failed to load config")?;
    let old = Snapshot::load_labeled(old, SnapshotLabel::Old)
        .with_context(|| format!("Failed to load old snapshot {}", old.display()))?;
    let baseline = match marker_baseline {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read marker baseline {}", path.display()))?,
        ),
        None => None,
    };

    let verdict = pipeline(host, user, config)?
        .rollback(&old, source, baseline)
        .await
        .context("Rollback aborted")?;

    print_verdict(&verdict, json)?;
    finish(verdict.passed)
}

fn print_report(report: &VerificationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn print_verdict(verdict: &SuiteVerdict, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(verdict)?);
        return Ok(());
    }
    let mark = if verdict.passed { "✓" } else { "✗" };
    println!("{mark} {}: {}", verdict.suite, verdict.message);
    for check in &verdict.checks {
        let note = if check.passed { " (note)" } else { "" };
        for diagnostic in &check.diagnostics {
            println!("    {}{note}: {diagnostic}", check.name);
        }
    }
    Ok(())
}

fn finish(passed: bool) -> Result<()> {
    if passed {
        Ok(())
    } else {
        anyhow::bail!("Upgrade verification failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use upcheck_core::Probe;

    fn write_snapshot(dir: &Path, label: SnapshotLabel, imgbase_w: &str) -> PathBuf {
        let outputs: BTreeMap<Probe, String> = Probe::ALL
            .iter()
            .map(|p| (*p, String::new()))
            .chain([(Probe::ImgbaseW, imgbase_w.to_string())])
            .collect();
        let path = dir.join(format!("{label}.json"));
        Snapshot::collected_now(label, outputs)
            .unwrap()
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_parse_verify_args() {
        let cli = Cli::try_parse_from([
            "upcheck",
            "--verbose",
            "verify",
            "--old",
            "old.json",
            "--new",
            "new.json",
            "--source-build",
            "redhat-virtualization-host-4.1-20170421.0",
            "--target-build",
            "redhat-virtualization-host-4.1-20170522.0",
            "--host-up",
            "false",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Verify {
                host_up,
                service_reachable,
                target_build,
                ..
            } => {
                assert_eq!(host_up, Some(false));
                assert_eq!(service_reachable, None);
                assert_eq!(target_build.date(), "20170522");
            }
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn test_parse_run_method_spelling() {
        let cli = Cli::try_parse_from([
            "upcheck",
            "run",
            "--host",
            "10.0.0.5",
            "--method",
            "yum-install",
            "--source-build",
            "redhat-virtualization-host-4.1-20170421.0",
            "--target-build",
            "redhat-virtualization-host-4.1-20170522.0",
            "--rpm-path",
            "/root/update.rpm",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { method, user, .. } => {
                assert_eq!(method, UpgradeMethod::YumInstall);
                assert_eq!(user, "root");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_rejects_malformed_build() {
        let parsed = Cli::try_parse_from([
            "upcheck",
            "rollback",
            "--host",
            "h",
            "--old",
            "old.json",
            "--source-build",
            "not-a-build",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_verify_same_layer_fails_basic_check() {
        let dir = tempfile::tempdir().unwrap();
        let w = "You are on rhvh-4.1-0.20170421.0+1\n";
        let old = write_snapshot(dir.path(), SnapshotLabel::Old, w);
        let new = write_snapshot(dir.path(), SnapshotLabel::New, w);
        let source = BuildId::parse("redhat-virtualization-host-4.1-20170421.0").unwrap();
        let target = BuildId::parse("redhat-virtualization-host-4.1-20170522.0").unwrap();

        let report = cmd_verify(&VerifyArgs {
            old: &old,
            new: &new,
            source: &source,
            target: &target,
            config: None,
            health: HostHealth::default(),
            signature_report: None,
        })
        .unwrap();

        assert!(!report.passed());
        assert_eq!(report.verdicts()["basic_upgrade_check"], false);
        assert!(finish(report.passed()).is_err());
    }

    #[test]
    fn test_verify_rejects_swapped_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let w = "You are on rhvh-4.1-0.20170421.0+1\n";
        let old = write_snapshot(dir.path(), SnapshotLabel::Old, w);
        let new = write_snapshot(dir.path(), SnapshotLabel::New, w);
        let build = BuildId::parse("redhat-virtualization-host-4.1-20170421.0").unwrap();

        let err = cmd_verify(&VerifyArgs {
            old: &new,
            new: &old,
            source: &build,
            target: &build,
            config: None,
            health: HostHealth::default(),
            signature_report: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("Failed to load old snapshot"));
    }

    #[test]
    fn test_verify_with_signature_report() {
        let dir = tempfile::tempdir().unwrap();
        let w = "You are on rhvh-4.1-0.20170421.0+1\n";
        let old = write_snapshot(dir.path(), SnapshotLabel::Old, w);
        let new = write_snapshot(dir.path(), SnapshotLabel::New, w);
        let report_path = dir.path().join("sig.txt");
        std::fs::write(&report_path, "vim-minimal-7.4.160-1.el7.x86_64 (none)\n").unwrap();
        let build = BuildId::parse("redhat-virtualization-host-4.1-20170522.0").unwrap();

        let report = cmd_verify(&VerifyArgs {
            old: &old,
            new: &new,
            source: &build,
            target: &build,
            config: None,
            health: HostHealth::default(),
            signature_report: Some(&report_path),
        })
        .unwrap();
        assert_eq!(report.verdicts()["signed_check"], false);
    }
}
