//! Polling read contract
//!
//! Tells readers how eagerly to re-fetch a deployment or its logs, and how
//! cached reads are partitioned and invalidated.

pub mod cache;
pub mod keys;

use std::time::Duration;

use crate::models::deployment::{Deploy, DeployStatus};

pub use cache::{CacheEntry, ReadCache};
pub use keys::QueryKey;

/// Recommended re-fetch intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingPolicy {
    /// Deployment reads while it is pending or in progress
    pub deploy_active: Duration,

    /// Deployment reads once it completed or failed
    pub deploy_settled: Duration,

    /// Log reads while the owning deployment is active
    pub logs_active: Duration,

    /// Log reads once the owning deployment settled
    pub logs_idle: Duration,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            deploy_active: Duration::from_secs(3),
            deploy_settled: Duration::from_secs(10),
            logs_active: Duration::from_secs(1),
            logs_idle: Duration::from_secs(30),
        }
    }
}

impl PollingPolicy {
    /// Next re-fetch delay for a deployment in `status`
    pub fn deploy_interval(&self, status: DeployStatus) -> Duration {
        if status.is_active() {
            self.deploy_active
        } else {
            self.deploy_settled
        }
    }

    pub fn deploy_refetch_interval(&self, deploy: &Deploy) -> Duration {
        self.deploy_interval(deploy.status())
    }

    /// Next re-fetch delay for the logs of a deployment in `owner`
    pub fn log_refetch_interval(&self, owner: DeployStatus) -> Duration {
        if owner.is_active() {
            self.logs_active
        } else {
            self.logs_idle
        }
    }

    /// Auto-refetch interval of the deployment list; `None` once nothing moves
    pub fn list_refetch_interval(&self, deploys: &[Deploy]) -> Option<Duration> {
        deploys
            .iter()
            .any(Deploy::is_active)
            .then_some(self.deploy_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::{ProviderState, ProviderStatus};
    use chrono::Utc;

    fn deploy(progress: u8, provider_status: ProviderStatus) -> Deploy {
        let now = Utc::now();
        let mut provider = ProviderState::new(1, "aws", now);
        provider.status = provider_status;
        Deploy {
            id: 1,
            repo_url: "https://github.com/acme/app".to_string(),
            progress,
            created_at: now,
            updated_at: now,
            completed_at: None,
            providers: vec![provider],
        }
    }

    #[test]
    fn test_deploy_interval_follows_liveness() {
        let policy = PollingPolicy::default();
        assert_eq!(policy.deploy_refetch_interval(&deploy(0, ProviderStatus::Pending)), Duration::from_secs(3));
        assert_eq!(policy.deploy_refetch_interval(&deploy(45, ProviderStatus::InProgress)), Duration::from_secs(3));
        assert_eq!(policy.deploy_refetch_interval(&deploy(100, ProviderStatus::Up)), Duration::from_secs(10));
        assert_eq!(policy.deploy_refetch_interval(&deploy(100, ProviderStatus::Down)), Duration::from_secs(10));
    }

    #[test]
    fn test_log_interval_follows_owner() {
        let policy = PollingPolicy::default();
        assert_eq!(policy.log_refetch_interval(DeployStatus::InProgress), Duration::from_secs(1));
        assert_eq!(policy.log_refetch_interval(DeployStatus::Pending), Duration::from_secs(1));
        assert_eq!(policy.log_refetch_interval(DeployStatus::Completed), Duration::from_secs(30));
        assert_eq!(policy.log_refetch_interval(DeployStatus::Failed), Duration::from_secs(30));
    }

    #[test]
    fn test_list_interval_stops_when_all_settled() {
        let policy = PollingPolicy::default();
        let settled = deploy(100, ProviderStatus::Up);
        let active = deploy(10, ProviderStatus::InProgress);

        assert_eq!(policy.list_refetch_interval(&[]), None);
        assert_eq!(policy.list_refetch_interval(&[settled.clone()]), None);
        assert_eq!(
            policy.list_refetch_interval(&[settled, active]),
            Some(Duration::from_secs(3))
        );
    }
}
