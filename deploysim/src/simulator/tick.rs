//! A single simulation tick, independent of any timer

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::warn;

use crate::models::deployment::{
    Deploy, DeployLogLevel, LogEntry, ProviderState, ProviderStatus, MAX_PROGRESS,
};
use crate::registry::IdSequence;
use crate::simulator::fsm::transition;
use crate::simulator::ladder::{completion_lines, resume_position, LADDER};

/// Tick parameters
#[derive(Debug, Clone)]
pub struct TickSettings {
    /// Progress added per tick
    pub progress_step: u8,

    /// Minimum time between two emissions of one run
    pub emission_interval: Duration,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self {
            progress_step: 5,
            emission_interval: Duration::from_millis(800),
        }
    }
}

/// State owned by one simulation run
#[derive(Debug, Clone)]
pub struct RunState {
    provider_ids: Vec<u64>,
    last_emission: Instant,
    positions: HashMap<u64, usize>,
    completed: bool,
    ticks: u32,
}

impl RunState {
    /// Start a run for `deploy`, continuing any ladder progress it already made
    pub fn resume(started_at: Instant, deploy: &Deploy) -> Self {
        Self {
            provider_ids: deploy.provider_ids(),
            last_emission: started_at,
            positions: deploy
                .providers
                .iter()
                .map(|p| (p.id, resume_position(p)))
                .collect(),
            completed: deploy.is_terminal(),
            ticks: 0,
        }
    }

    /// Whether `deploy` is the deployment this run was started for
    pub fn tracks(&self, deploy: &Deploy) -> bool {
        deploy.providers.iter().map(|p| p.id).eq(self.provider_ids.iter().copied())
    }

    /// Ladder rungs a provider has climbed in this run
    pub fn position(&self, provider_id: u64) -> usize {
        self.positions.get(&provider_id).copied().unwrap_or(0)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub progress: u8,

    /// Log lines appended by this tick
    pub emitted: usize,

    /// Progress reached 100 on this tick or earlier
    pub completed: bool,
}

/// Advance `deploy` by one tick.
///
/// `now` drives the emission gate, `timestamp` stamps the mutation.
pub fn apply_tick(
    deploy: &mut Deploy,
    run: &mut RunState,
    ids: &IdSequence,
    settings: &TickSettings,
    now: Instant,
    timestamp: DateTime<Utc>,
) -> TickOutcome {
    if run.completed || deploy.is_terminal() {
        run.completed = true;
        return TickOutcome {
            progress: deploy.progress,
            emitted: 0,
            completed: true,
        };
    }

    run.ticks += 1;
    let progress = deploy.advance(settings.progress_step.max(1));
    deploy.updated_at = timestamp;

    let emitted = if progress >= MAX_PROGRESS {
        complete(deploy, ids, timestamp);
        run.completed = true;
        deploy.completed_at.get_or_insert(timestamp);
        deploy.providers.len() * 2
    } else if now.saturating_duration_since(run.last_emission) >= settings.emission_interval {
        let deploy_id = deploy.id;
        let mut emitted = 0;
        for provider in deploy.providers.iter_mut() {
            let position = run.positions.entry(provider.id).or_insert(0);
            if climb(deploy_id, provider, *position, progress, ids, timestamp) {
                *position += 1;
                emitted += 1;
            }
        }
        if emitted > 0 {
            run.last_emission = now;
        }
        emitted
    } else {
        0
    };

    TickOutcome {
        progress,
        emitted,
        completed: run.completed,
    }
}

/// Fire the provider's next rung if it applies
fn climb(
    deploy_id: u64,
    provider: &mut ProviderState,
    position: usize,
    progress: u8,
    ids: &IdSequence,
    timestamp: DateTime<Utc>,
) -> bool {
    let Some(rung) = LADDER.get(position) else {
        return false;
    };
    if !rung.applies(progress, provider) {
        return false;
    }

    match transition(provider.status, rung.becomes) {
        Ok(status) => {
            provider.status = status;
            let message = rung.render(&provider.slug);
            append(deploy_id, provider, ids, rung.level, message, timestamp);
            true
        }
        Err(e) => {
            warn!("Deployment {} provider {}: {}", deploy_id, provider.slug, e);
            false
        }
    }
}

/// Absorbing completion: every provider goes up with a success and an availability line
fn complete(deploy: &mut Deploy, ids: &IdSequence, timestamp: DateTime<Utc>) {
    let deploy_id = deploy.id;
    for provider in deploy.providers.iter_mut() {
        provider.status = transition(provider.status, ProviderStatus::Up).unwrap_or(ProviderStatus::Up);
        for (level, message) in completion_lines(&provider.slug) {
            append(deploy_id, provider, ids, level, message, timestamp);
        }
    }
}

fn append(
    deploy_id: u64,
    provider: &mut ProviderState,
    ids: &IdSequence,
    level: DeployLogLevel,
    message: String,
    timestamp: DateTime<Utc>,
) {
    provider.push_log(LogEntry {
        id: ids.next_id(),
        deploy_id,
        provider_id: provider.id,
        level,
        message,
        timestamp,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::DeployStatus;

    fn deploy(slugs: &[&str], ids: &IdSequence) -> Deploy {
        let now = Utc::now();
        Deploy {
            id: 1,
            repo_url: "https://github.com/acme/app".to_string(),
            progress: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            providers: slugs
                .iter()
                .map(|slug| ProviderState::new(ids.next_id(), *slug, now))
                .collect(),
        }
    }

    /// Tick until completion with `spacing` between ticks
    fn run_to_end(deploy: &mut Deploy, ids: &IdSequence, settings: &TickSettings, spacing: Duration) -> Vec<TickOutcome> {
        let start = Instant::now();
        let mut run = RunState::resume(start, deploy);
        let mut outcomes = Vec::new();
        let mut now = start;
        while !run.is_completed() {
            now += spacing;
            outcomes.push(apply_tick(deploy, &mut run, ids, settings, now, Utc::now()));
            assert!(outcomes.len() <= 100, "run did not terminate");
        }
        outcomes
    }

    #[test]
    fn test_run_tracks_only_its_own_deployment() {
        let ids = IdSequence::default();
        let original = deploy(&["aws", "oracle"], &ids);
        let run = RunState::resume(Instant::now(), &original);

        // Same id, fresh providers: a different deployment
        let recreated = deploy(&["aws", "oracle"], &ids);
        assert_eq!(recreated.id, original.id);

        let mut progressed = original.clone();
        progressed.advance(40);
        assert!(run.tracks(&progressed));
        assert!(!run.tracks(&recreated));
    }

    #[test]
    fn test_twenty_ticks_reach_completion() {
        let ids = IdSequence::default();
        let mut deploy = deploy(&["aws", "oracle"], &ids);

        let outcomes = run_to_end(&mut deploy, &ids, &TickSettings::default(), Duration::from_secs(1));

        assert_eq!(outcomes.len(), 20);
        let progress: Vec<u8> = outcomes.iter().map(|o| o.progress).collect();
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.last(), Some(&100));
        assert!(outcomes[..19].iter().all(|o| !o.completed));
        assert_eq!(deploy.status(), DeployStatus::Completed);
        assert!(deploy.completed_at.is_some());
    }

    #[test]
    fn test_every_milestone_fires_once_then_completion_lines() {
        let ids = IdSequence::default();
        let mut deploy = deploy(&["aws", "oracle"], &ids);

        run_to_end(&mut deploy, &ids, &TickSettings::default(), Duration::from_secs(1));

        for provider in &deploy.providers {
            assert_eq!(provider.status, ProviderStatus::Up);
            assert_eq!(provider.logs.len(), LADDER.len() + 2);
            for (rung, log) in LADDER.iter().zip(&provider.logs) {
                assert_eq!(log.message, rung.render(&provider.slug));
                assert_eq!(log.level, rung.level);
            }
            let tail = &provider.logs[LADDER.len()..];
            assert_eq!(tail[0].level, DeployLogLevel::Success);
            assert_eq!(tail[1].message, completion_lines(&provider.slug)[1].1);
        }
    }

    #[test]
    fn test_closed_gate_skips_rungs_but_completion_still_wins() {
        let ids = IdSequence::default();
        let mut deploy = deploy(&["aws"], &ids);
        let settings = TickSettings {
            progress_step: 5,
            emission_interval: Duration::from_millis(2500),
        };

        run_to_end(&mut deploy, &ids, &settings, Duration::from_secs(1));

        let provider = &deploy.providers[0];
        assert_eq!(provider.status, ProviderStatus::Up);
        assert!(provider.logs.len() < LADDER.len() + 2);
        let levels: Vec<DeployLogLevel> = provider.logs.iter().rev().take(2).map(|l| l.level).collect();
        assert_eq!(levels, vec![DeployLogLevel::Info, DeployLogLevel::Success]);

        let messages: Vec<&str> = provider.logs.iter().map(|l| l.message.as_str()).collect();
        let mut unique = messages.clone();
        unique.dedup();
        assert_eq!(messages, unique);
    }

    #[test]
    fn test_gate_closed_within_interval() {
        let ids = IdSequence::default();
        let mut deploy = deploy(&["aws"], &ids);
        deploy.progress = 5;
        let start = Instant::now();
        let mut run = RunState::resume(start, &deploy);
        let settings = TickSettings::default();

        let early = apply_tick(&mut deploy, &mut run, &ids, &settings, start + Duration::from_millis(100), Utc::now());
        assert_eq!(early.progress, 10);
        assert_eq!(early.emitted, 0);
        assert_eq!(deploy.providers[0].status, ProviderStatus::Pending);

        let late = apply_tick(&mut deploy, &mut run, &ids, &settings, start + Duration::from_millis(900), Utc::now());
        assert_eq!(late.emitted, 1);
        assert_eq!(deploy.providers[0].status, ProviderStatus::InProgress);
    }

    #[test]
    fn test_terminal_deploy_is_not_mutated() {
        let ids = IdSequence::default();
        let mut deploy = deploy(&["aws"], &ids);
        run_to_end(&mut deploy, &ids, &TickSettings::default(), Duration::from_secs(1));
        let finished = deploy.clone();

        let mut run = RunState::resume(Instant::now(), &deploy);
        let outcome = apply_tick(&mut deploy, &mut run, &ids, &TickSettings::default(), Instant::now(), Utc::now());

        assert!(outcome.completed);
        assert_eq!(outcome.emitted, 0);
        assert_eq!(deploy, finished);
    }

    #[test]
    fn test_log_ids_unique_across_providers() {
        let ids = IdSequence::default();
        let mut deploy = deploy(&["aws", "oracle"], &ids);
        run_to_end(&mut deploy, &ids, &TickSettings::default(), Duration::from_secs(1));

        let mut all: Vec<u64> = deploy
            .providers
            .iter()
            .flat_map(|p| std::iter::once(p.id).chain(p.logs.iter().map(|l| l.id)))
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
