//! Error taxonomy for upcheck-core.
//!
//! Rule violations are never errors: they come back as failed
//! [`CheckResult`](crate::rules::CheckResult)s. The types here describe
//! inputs that could not be parsed into the shape a rule expects.

/// A string did not have the shape its parser requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("version string '{input}' has no dotted-numeric field")]
    MissingVersionField { input: String },

    #[error("version component '{component}' in '{input}' is not numeric")]
    NonNumericComponent { input: String, component: String },

    #[error("version component counts differ: old has {old_len} ({old}), new has {new_len} ({new})")]
    ComponentCountMismatch {
        old: String,
        new: String,
        old_len: usize,
        new_len: usize,
    },

    #[error("invalid build identifier '{input}': {reason}")]
    InvalidBuildId { input: String, reason: String },

    #[error("invalid imgbase layer '{input}': {reason}")]
    InvalidLayer { input: String, reason: String },

    #[error("invalid volume size '{input}'")]
    InvalidSize { input: String },
}

/// Probe output did not contain a structure a rule needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissingDataError {
    #[error("{probe} output is empty")]
    EmptyOutput { probe: String },

    #[error("no line matching {pattern} in {listing} listing")]
    PatternNotFound { pattern: String, listing: String },
}

/// Either kind of bad rule input, for rules that parse several probes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    MissingData(#[from] MissingDataError),
}

/// A standalone check does not apply to this upgrade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{check} is not applicable: {reason}")]
pub struct NotApplicable {
    pub check: String,
    pub reason: String,
}

/// Snapshot construction and loading errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot '{label}' is missing probe output: {probe}")]
    MissingProbe { label: String, probe: String },

    #[error("snapshot label mismatch: expected {expected}, got {actual}")]
    LabelMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
