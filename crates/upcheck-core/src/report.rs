//! Verification report: suite verdicts plus the inputs that produced them.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build::BuildId;
use crate::snapshot::Snapshot;
use crate::suite::{self, SuiteVerdict, VerifyContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Identifier of the upgrade run, when produced by the harness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub source_build: String,
    pub target_build: String,
    pub old_digest: String,
    pub new_digest: String,
    pub generated_at: DateTime<Utc>,
    /// Suite name to verdict, ordered by name.
    pub suites: BTreeMap<String, SuiteVerdict>,
}

impl VerificationReport {
    pub fn new(source: &BuildId, target: &BuildId, old: &Snapshot, new: &Snapshot) -> Self {
        Self {
            run_id: None,
            source_build: source.to_string(),
            target_build: target.to_string(),
            old_digest: old.digest(),
            new_digest: new.digest(),
            generated_at: Utc::now(),
            suites: BTreeMap::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Add or replace a suite verdict.
    pub fn insert(&mut self, verdict: SuiteVerdict) {
        self.suites.insert(verdict.suite.clone(), verdict);
    }

    pub fn passed(&self) -> bool {
        self.suites.values().all(|v| v.passed)
    }

    /// Suite name to boolean verdict.
    pub fn verdicts(&self) -> BTreeMap<String, bool> {
        self.suites
            .iter()
            .map(|(name, v)| (name.clone(), v.passed))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary: one line per suite, then each failure diagnostic
    /// and each note attached to a passed check.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(run_id) = &self.run_id {
            let _ = writeln!(out, "Run: {run_id}");
        }
        let _ = writeln!(out, "Upgrade: {} -> {}", self.source_build, self.target_build);
        for verdict in self.suites.values() {
            let mark = if verdict.passed { "✓" } else { "✗" };
            let _ = writeln!(out, "  {mark} {}: {}", verdict.suite, verdict.message);
            for check in &verdict.checks {
                let note = if check.passed { " (note)" } else { "" };
                for diagnostic in &check.diagnostics {
                    let _ = writeln!(out, "      {}{note}: {diagnostic}", check.name);
                }
            }
        }
        let overall = if self.passed() { "PASSED" } else { "FAILED" };
        let _ = writeln!(out, "Result: {overall}");
        out
    }
}

/// Run every snapshot-based suite and collect the verdicts.
pub fn verify(ctx: &VerifyContext<'_>) -> VerificationReport {
    let mut report =
        VerificationReport::new(ctx.source, ctx.target, ctx.pair.old, ctx.pair.new);
    report.insert(suite::basic_upgrade_check(ctx));
    report.insert(suite::packages_check(ctx));
    report.insert(suite::cmds_check(ctx));
    report
}
