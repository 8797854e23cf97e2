//! Management plane boundary.
//!
//! Only the two calls the upgrade flow needs are modelled. Datacenter,
//! cluster and host registration happen outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

/// Status string the management plane reports for a healthy host.
pub const HOST_UP: &str = "up";

#[async_trait]
pub trait ManagementPlane: Send + Sync {
    /// Current status of `host`, or `None` if the host is not registered.
    async fn host_status(&self, host: &str) -> Result<Option<String>>;

    /// Ask the management plane to upgrade `host`. Returns once the request is accepted.
    async fn upgrade_host(&self, host: &str) -> Result<()>;
}

/// Bounded polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Poll until `host` reports `up`. Errors from the plane count as a failed poll.
///
/// Returns whether the host came up within the policy.
pub async fn wait_host_up(plane: &dyn ManagementPlane, host: &str, policy: PollPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        match plane.host_status(host).await {
            Ok(Some(status)) if status == HOST_UP => {
                info!(host, attempt, "host is up on management plane");
                return true;
            }
            Ok(status) => info!(host, attempt, status = ?status, "host not up yet"),
            Err(e) => warn!(host, attempt, error = %e, "host status query failed"),
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    warn!(host, attempts = policy.max_attempts, "host is not up on management plane");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryManagementPlane;

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts,
            interval: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_wait_until_up() {
        let plane = MemoryManagementPlane::new()
            .with_statuses("host1", &["installing", "non_responsive", "up"]);
        assert!(wait_host_up(&plane, "host1", fast(5)).await);
    }

    #[tokio::test]
    async fn test_wait_gives_up() {
        let plane = MemoryManagementPlane::new()
            .with_statuses("host1", &["installing", "installing", "installing", "up"]);
        assert!(!wait_host_up(&plane, "host1", fast(3)).await);
    }
}
