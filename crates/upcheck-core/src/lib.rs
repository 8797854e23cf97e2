//! upcheck core library
//!
//! Pure verification engine: snapshot store, version and build comparators,
//! layout differ, rules and suites. No host I/O happens here.

pub mod build;
pub mod config;
pub mod error;
pub mod layout;
pub mod probe;
pub mod report;
pub mod rules;
pub mod snapshot;
pub mod suite;
pub mod telemetry;
pub mod version;

pub use build::{new_volumes_expected, BuildId, ImgbaseLayer};

pub use config::{CheckConfig, NewVolume, SettingsMarker};

pub use error::{ConfigError, FormatError, InputError, MissingDataError, NotApplicable, SnapshotError};

pub use layout::{LayoutRule, LayoutViolation};

pub use probe::Probe;

pub use report::{verify, VerificationReport};

pub use rules::{CheckResult, HostHealth, KernelSpaceObservation, RollbackObservation};

pub use snapshot::{Snapshot, SnapshotLabel, SnapshotPair};

pub use suite::{RollbackBaseline, SuiteVerdict, VerifyContext};

pub use version::{check_monotonic, Monotonicity, VersionToken};
