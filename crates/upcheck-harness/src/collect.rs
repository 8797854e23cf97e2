//! Snapshot collection.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, error, info};
use upcheck_core::{Probe, Snapshot, SnapshotLabel};

use crate::error::{HarnessError, Result};
use crate::runner::CommandRunner;

/// Run every probe and build a snapshot. The first failing probe aborts collection.
pub async fn collect_snapshot(
    runner: &dyn CommandRunner,
    label: SnapshotLabel,
    timeout: Duration,
) -> Result<Snapshot> {
    info!(label = %label, "collecting snapshot");
    let mut outputs = BTreeMap::new();

    for probe in Probe::ALL {
        let result = runner.run(probe.command(), timeout).await;
        if !result.success {
            error!(label = %label, probe = %probe, output = %result.output, "probe failed");
            return Err(HarnessError::CollectionFailed {
                label: label.to_string(),
                probe: probe.to_string(),
                output: result.output,
            });
        }
        debug!(label = %label, probe = %probe, output = %result.output, "probe output");
        outputs.insert(probe, result.output);
    }

    let snapshot = Snapshot::collected_now(label, outputs)?;
    info!(label = %label, digest = %snapshot.digest(), "snapshot collected");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use crate::runner::CommandOutput;

    fn scripted_all() -> ScriptedRunner {
        let runner = ScriptedRunner::new();
        for probe in Probe::ALL {
            runner.respond_ok(probe.command(), &format!("{} output", probe.name()));
        }
        runner
    }

    #[tokio::test]
    async fn test_collects_every_probe() {
        let runner = scripted_all();
        let snapshot = collect_snapshot(&runner, SnapshotLabel::Old, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(snapshot.get(Probe::Findmnt), "findmnt output");
        assert_eq!(runner.calls().len(), Probe::ALL.len());
    }

    #[tokio::test]
    async fn test_failed_probe_aborts() {
        let runner = ScriptedRunner::new();
        runner.respond_ok(Probe::ImgbasedVer.command(), "imgbased-0.9.27-0.1.el7ev.noarch");
        runner.respond(Probe::UpdateVer.command(), CommandOutput::failed("exit 1"));

        let err = collect_snapshot(&runner, SnapshotLabel::New, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::CollectionFailed { ref probe, .. } if probe == "update_ver"
        ));
        // Nothing after the failing probe ran.
        assert_eq!(runner.calls().len(), 2);
    }
}
