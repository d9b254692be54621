//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of deployment progress
pub const MAX_PROGRESS: u8 = 100;

/// Overall status of a deployment, derived from progress and providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl DeployStatus {
    /// Derive the status of a deployment at `progress` with the given providers
    pub fn derive(progress: u8, providers: &[ProviderState]) -> Self {
        match progress {
            0 => DeployStatus::Pending,
            p if p < MAX_PROGRESS => DeployStatus::InProgress,
            _ if providers.iter().any(|p| p.status == ProviderStatus::Down) => DeployStatus::Failed,
            _ => DeployStatus::Completed,
        }
    }

    /// Pending and in-progress deployments are still moving
    pub fn is_active(&self) -> bool {
        matches!(self, DeployStatus::Pending | DeployStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStatus::Pending => "pending",
            DeployStatus::InProgress => "in_progress",
            DeployStatus::Completed => "completed",
            DeployStatus::Failed => "failed",
        }
    }
}

/// Status of one provider within a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    InProgress,
    Up,
    Down,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Pending => "pending",
            ProviderStatus::InProgress => "in_progress",
            ProviderStatus::Up => "up",
            ProviderStatus::Down => "down",
        }
    }
}

/// Severity of a deployment log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployLogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Success,
}

impl DeployLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployLogLevel::Debug => "debug",
            DeployLogLevel::Info => "info",
            DeployLogLevel::Warning => "warning",
            DeployLogLevel::Error => "error",
            DeployLogLevel::Critical => "critical",
            DeployLogLevel::Success => "success",
        }
    }
}

impl std::str::FromStr for DeployLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(DeployLogLevel::Debug),
            "info" => Ok(DeployLogLevel::Info),
            "warning" | "warn" => Ok(DeployLogLevel::Warning),
            "error" => Ok(DeployLogLevel::Error),
            "critical" => Ok(DeployLogLevel::Critical),
            "success" => Ok(DeployLogLevel::Success),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// A log line emitted for one provider of one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique across every deployment and provider
    pub id: u64,

    /// Owning deployment
    pub deploy_id: u64,

    /// Owning provider state
    pub provider_id: u64,

    pub level: DeployLogLevel,

    pub message: String,

    pub timestamp: DateTime<Utc>,
}

/// Per-provider sub-status and log trail of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    pub id: u64,

    /// Catalog slug, e.g. "aws"
    pub slug: String,

    pub status: ProviderStatus,

    /// Append-only, ordered by timestamp
    #[serde(default)]
    pub logs: Vec<LogEntry>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ProviderState {
    /// A fresh provider with no logs
    pub fn new(id: u64, slug: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            slug: slug.into(),
            status: ProviderStatus::Pending,
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a log line.
    ///
    /// The timestamp is never earlier than the previous entry's so the list
    /// stays sorted even if the wall clock steps backwards.
    pub fn push_log(&mut self, mut entry: LogEntry) {
        if let Some(last) = self.logs.last() {
            if entry.timestamp < last.timestamp {
                entry.timestamp = last.timestamp;
            }
        }
        self.updated_at = entry.timestamp;
        self.logs.push(entry);
    }
}

/// One deployment run targeting one or more providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    pub id: u64,

    pub repo_url: String,

    /// 0..=100, never decreases
    pub progress: u8,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set once, when progress first reaches 100
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Fixed at creation
    pub providers: Vec<ProviderState>,
}

impl Deploy {
    /// Derived status, see [`DeployStatus::derive`]
    pub fn status(&self) -> DeployStatus {
        DeployStatus::derive(self.progress, &self.providers)
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.progress >= MAX_PROGRESS
    }

    /// Raise progress by `step`, clamped to 100. Returns the new progress.
    pub fn advance(&mut self, step: u8) -> u8 {
        self.progress = self.progress.saturating_add(step).min(MAX_PROGRESS);
        self.progress
    }

    /// Logs of every provider matching `filter`, oldest first
    pub fn logs(&self, filter: &LogFilter) -> Vec<LogRecord> {
        let mut logs: Vec<LogRecord> = self
            .providers
            .iter()
            .filter(|p| filter.provider.as_deref().is_none_or(|slug| p.slug == slug))
            .flat_map(|p| {
                p.logs.iter().map(move |entry| LogRecord {
                    provider_slug: p.slug.clone(),
                    entry: entry.clone(),
                })
            })
            .filter(|record| filter.level.is_none_or(|level| record.entry.level == level))
            .collect();
        logs.sort_by(|a, b| {
            a.entry
                .timestamp
                .cmp(&b.entry.timestamp)
                .then(a.entry.id.cmp(&b.entry.id))
        });
        logs
    }

    /// Provider ids in order. They come from a sequence that never repeats,
    /// so they tell two deployments apart even when one reuses the other's id.
    pub fn provider_ids(&self) -> Vec<u64> {
        self.providers.iter().map(|p| p.id).collect()
    }

    /// Highest provider or log id used by this deployment
    pub fn max_child_id(&self) -> u64 {
        self.providers
            .iter()
            .flat_map(|p| std::iter::once(p.id).chain(p.logs.iter().map(|l| l.id)))
            .max()
            .unwrap_or(0)
    }
}

/// A log entry together with the slug of the provider that emitted it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub provider_slug: String,
    pub entry: LogEntry,
}

/// Optional provider/level restriction of a log read
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LogFilter {
    pub provider: Option<String>,
    pub level: Option<DeployLogLevel>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none() && self.level.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: u64, slug: &str, status: ProviderStatus) -> ProviderState {
        let mut state = ProviderState::new(id, slug, Utc::now());
        state.status = status;
        state
    }

    #[test]
    fn test_status_derivation() {
        let up = vec![provider(1, "aws", ProviderStatus::Up)];
        let down = vec![
            provider(1, "aws", ProviderStatus::Up),
            provider(2, "oracle", ProviderStatus::Down),
        ];

        assert_eq!(DeployStatus::derive(0, &up), DeployStatus::Pending);
        assert_eq!(DeployStatus::derive(5, &up), DeployStatus::InProgress);
        assert_eq!(DeployStatus::derive(99, &down), DeployStatus::InProgress);
        assert_eq!(DeployStatus::derive(100, &up), DeployStatus::Completed);
        assert_eq!(DeployStatus::derive(100, &down), DeployStatus::Failed);
    }

    #[test]
    fn test_advance_clamps_at_100() {
        let now = Utc::now();
        let mut deploy = Deploy {
            id: 1,
            repo_url: "https://github.com/acme/app".to_string(),
            progress: 97,
            created_at: now,
            updated_at: now,
            completed_at: None,
            providers: vec![],
        };
        assert_eq!(deploy.advance(5), 100);
        assert_eq!(deploy.advance(5), 100);
        assert!(deploy.is_terminal());
    }

    #[test]
    fn test_push_log_keeps_timestamps_ordered() {
        let now = Utc::now();
        let mut state = ProviderState::new(1, "aws", now);
        let entry = |id, timestamp| LogEntry {
            id,
            deploy_id: 1,
            provider_id: 1,
            level: DeployLogLevel::Info,
            message: "step".to_string(),
            timestamp,
        };

        state.push_log(entry(2, now));
        state.push_log(entry(3, now - chrono::Duration::seconds(10)));

        assert_eq!(state.logs[1].timestamp, now);
        assert_eq!(state.updated_at, now);
    }

    #[test]
    fn test_log_level_serde_names() {
        assert_eq!(serde_json::to_string(&DeployLogLevel::Success).unwrap(), "\"success\"");
        assert_eq!("WARNING".parse::<DeployLogLevel>().unwrap(), DeployLogLevel::Warning);
        assert_eq!(serde_json::to_string(&ProviderStatus::InProgress).unwrap(), "\"in_progress\"");
    }
}
