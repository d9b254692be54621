//! Milestone ladder driving provider log emission

use crate::models::deployment::{DeployLogLevel, ProviderState, ProviderStatus};

/// One rung of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    /// Progress the deployment must have reached
    pub threshold: u8,

    /// Provider status required for the rung to fire
    pub requires: ProviderStatus,

    /// Provider status after the rung fired
    pub becomes: ProviderStatus,

    pub level: DeployLogLevel,

    /// `{provider}` is replaced by the upper-cased provider slug
    pub message: &'static str,
}

impl Milestone {
    /// Whether this rung may fire for `provider` at `progress`
    pub fn applies(&self, progress: u8, provider: &ProviderState) -> bool {
        progress >= self.threshold && provider.status == self.requires
    }

    pub fn render(&self, slug: &str) -> String {
        render(self.message, slug)
    }
}

const fn rung(
    threshold: u8,
    requires: ProviderStatus,
    level: DeployLogLevel,
    message: &'static str,
) -> Milestone {
    Milestone {
        threshold,
        requires,
        becomes: ProviderStatus::InProgress,
        level,
        message,
    }
}

/// Rungs in firing order; a provider climbs at most one rung per emission
pub const LADDER: [Milestone; 9] = [
    rung(10, ProviderStatus::Pending, DeployLogLevel::Debug, "Starting deployment process for {provider}"),
    rung(20, ProviderStatus::InProgress, DeployLogLevel::Debug, "Analyzing project structure for {provider}"),
    rung(30, ProviderStatus::InProgress, DeployLogLevel::Debug, "Checking dependencies and requirements for {provider}"),
    rung(40, ProviderStatus::InProgress, DeployLogLevel::Info, "Configuring infrastructure resources on {provider}"),
    rung(50, ProviderStatus::InProgress, DeployLogLevel::Debug, "Preparing runtime environment on {provider}"),
    rung(60, ProviderStatus::InProgress, DeployLogLevel::Info, "Starting application build on {provider}"),
    rung(70, ProviderStatus::InProgress, DeployLogLevel::Info, "Deploying containers and services on {provider}"),
    rung(80, ProviderStatus::InProgress, DeployLogLevel::Info, "Running integration tests on {provider}"),
    rung(90, ProviderStatus::InProgress, DeployLogLevel::Debug, "Setting up monitoring and logging on {provider}"),
];

/// Final lines appended to every provider when the deployment completes
pub const COMPLETION_LINES: [(DeployLogLevel, &str); 2] = [
    (DeployLogLevel::Success, "Deployment completed successfully on {provider}"),
    (DeployLogLevel::Info, "Application available and ready to use on {provider}"),
];

/// Ladder position of a provider whose run is picked up again, e.g. after a restart.
///
/// Each rung appends exactly one line, so the log count of a provider that
/// left `pending` is the number of rungs it already climbed.
pub fn resume_position(provider: &ProviderState) -> usize {
    match provider.status {
        ProviderStatus::Pending => 0,
        _ => provider.logs.len().clamp(1, LADDER.len()),
    }
}

fn render(template: &str, slug: &str) -> String {
    template.replace("{provider}", &slug.to_uppercase())
}

/// Render the completion lines for one provider
pub fn completion_lines(slug: &str) -> [(DeployLogLevel, String); 2] {
    COMPLETION_LINES.map(|(level, template)| (level, render(template, slug)))
}
