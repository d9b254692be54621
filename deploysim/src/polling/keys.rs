//! Cache keys for deployment reads

use std::fmt;

use crate::models::deployment::LogFilter;

/// Identity of one cached read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    DeployList,
    DeployDetail(u64),
    /// Unfiltered logs of a deployment
    Logs(u64),
    /// Logs of a deployment restricted by provider and/or level
    FilteredLogs(u64, LogFilter),
}

impl QueryKey {
    /// Key for a log read; an empty filter is the unfiltered view
    pub fn logs(deploy_id: u64, filter: LogFilter) -> Self {
        if filter.is_empty() {
            QueryKey::Logs(deploy_id)
        } else {
            QueryKey::FilteredLogs(deploy_id, filter)
        }
    }

    pub fn deploy_id(&self) -> Option<u64> {
        match self {
            QueryKey::DeployList => None,
            QueryKey::DeployDetail(id) | QueryKey::Logs(id) | QueryKey::FilteredLogs(id, _) => Some(*id),
        }
    }

    /// Whether invalidating `target` also invalidates this key.
    ///
    /// `Logs(id)` is a prefix of every `FilteredLogs(id, _)`; every other key
    /// only matches itself.
    pub fn invalidated_by(&self, target: &QueryKey) -> bool {
        match (target, self) {
            (QueryKey::Logs(a), QueryKey::FilteredLogs(b, _)) => a == b,
            _ => self == target,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::DeployList => write!(f, "deploys"),
            QueryKey::DeployDetail(id) => write!(f, "deploy/{}", id),
            QueryKey::Logs(id) => write!(f, "logs/{}", id),
            QueryKey::FilteredLogs(id, filter) => write!(
                f,
                "logs/{}/{}/{}",
                id,
                filter.provider.as_deref().unwrap_or("*"),
                filter.level.map_or("*", |l| l.as_str())
            ),
        }
    }
}
