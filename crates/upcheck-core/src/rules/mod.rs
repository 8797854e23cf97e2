//! Verification rules.
//!
//! Each rule is a pure function over snapshot text (plus build metadata and
//! config) that returns exactly one [`CheckResult`]. Malformed input never
//! aborts a run: format and missing-data errors become failed results
//! carrying the error text.

pub mod host;
pub mod imgbase;
pub mod packages;
pub mod rollback;
pub mod storage;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub use host::HostHealth;
pub use rollback::{KernelSpaceObservation, RollbackObservation};

/// Outcome of one named rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Violations on failure; informational notes on a pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl CheckResult {
    pub fn pass(name: &str) -> Self {
        info!(check = name, "passed");
        Self {
            name: name.to_string(),
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    /// A pass that still carries a note, e.g. when an observation was unavailable.
    pub fn pass_with_note(name: &str, note: impl Into<String>) -> Self {
        let note = note.into();
        info!(check = name, note = %note, "passed");
        Self {
            name: name.to_string(),
            passed: true,
            diagnostics: vec![note],
        }
    }

    pub fn fail(name: &str, diagnostic: impl Into<String>) -> Self {
        Self::from_diagnostics(name, vec![diagnostic.into()])
    }

    /// Pass iff `diagnostics` is empty; each diagnostic is logged.
    pub fn from_diagnostics(name: &str, diagnostics: Vec<String>) -> Self {
        if diagnostics.is_empty() {
            return Self::pass(name);
        }
        for diagnostic in &diagnostics {
            error!(check = name, "{diagnostic}");
        }
        Self {
            name: name.to_string(),
            passed: false,
            diagnostics,
        }
    }
}

/// Fail `name` with the error's message when a parse step did not succeed.
pub(crate) fn check_with<E, F>(name: &str, f: F) -> CheckResult
where
    E: std::fmt::Display,
    F: FnOnce() -> Result<Vec<String>, E>,
{
    match f() {
        Ok(diagnostics) => CheckResult::from_diagnostics(name, diagnostics),
        Err(e) => CheckResult::fail(name, e.to_string()),
    }
}

/// Unique non-empty trimmed lines.
pub(crate) fn line_set(text: &str) -> std::collections::BTreeSet<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}
