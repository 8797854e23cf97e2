//! upcheck harness - drives a host through an upgrade
//!
//! Provides the orchestration around the pure verification engine:
//! - Runs probe commands locally or over SSH and assembles snapshots
//! - Prepares the host, performs the upgrade and waits for it to return
//! - Feeds collected state to the upcheck-core suites

pub mod collect;
pub mod config;
pub mod error;
pub mod fakes;
pub mod lifecycle;
pub mod management;
pub mod observe;
pub mod pipeline;
pub mod reachability;
pub mod runner;
pub mod upgrade;

// Re-export key types
pub use collect::collect_snapshot;
pub use config::{HarnessConfig, UpcheckConfig};
pub use error::{HarnessError, Result};
pub use lifecycle::{enter_system, RebootFlavor};
pub use management::{wait_host_up, ManagementPlane, PollPolicy};
pub use pipeline::{PipelineResult, UpgradePipeline, UpgradeSpec};
pub use reachability::{HttpServiceProbe, ServiceProbe};
pub use runner::{CommandOutput, CommandRunner, LocalRunner, SshRunner};
pub use upgrade::{perform_upgrade, UpgradeMethod};
