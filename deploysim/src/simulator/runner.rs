//! Timer-driven simulation runs, one per deployment

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::SimError;
use crate::models::deployment::Deploy;
use crate::registry::Registry;
use crate::simulator::tick::{apply_tick, RunState, TickSettings};

const EVENT_CAPACITY: usize = 256;

/// Simulator options
#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// Delay between the end of one tick and the start of the next
    pub tick_interval: Duration,

    /// Per-tick parameters
    pub tick: TickSettings,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            tick: TickSettings::default(),
        }
    }
}

/// Handle of a live run. Dropping it cancels the run.
struct RunHandle {
    generation: u64,
    provider_ids: Vec<u64>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RunHandle {
    fn is_live(&self) -> bool {
        self.cancel.is_some() && !self.task.is_finished()
    }
}

type RunMap = Arc<Mutex<HashMap<u64, RunHandle>>>;

/// Starts, tracks and cancels simulation runs
pub struct Simulator {
    registry: Arc<Registry>,
    options: SimulatorOptions,
    runs: RunMap,
    events: broadcast::Sender<Deploy>,
    generation: AtomicU64,
}

impl Simulator {
    pub fn new(registry: Arc<Registry>, options: SimulatorOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry,
            options,
            runs: Arc::new(Mutex::new(HashMap::new())),
            events,
            generation: AtomicU64::new(0),
        }
    }

    /// Receive a snapshot of every deployment after each of its ticks
    pub fn subscribe(&self) -> broadcast::Receiver<Deploy> {
        self.events.subscribe()
    }

    /// Start simulating a deployment.
    ///
    /// Returns `Ok(false)` when a run for the id is already live or the
    /// deployment has finished.
    pub async fn start(&self, id: u64) -> Result<bool, SimError> {
        let provider_ids = self.find(id).await?.provider_ids();

        // A cancelled run may still be inside its last tick, and a run of a
        // deleted deployment may still hold this id. Stop and await either so
        // two runs never write the same deployment.
        let stale = {
            let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            let same_live_run = runs
                .get(&id)
                .map(|run| run.is_live() && run.provider_ids == provider_ids);
            match same_live_run {
                Some(true) => return Ok(false),
                Some(false) => runs.remove(&id),
                None => None,
            }
        };
        if let Some(mut stale) = stale {
            debug!("Waiting for the previous run of deployment {} to stop", id);
            stale.cancel.take();
            let _ = stale.task.await;
        }

        let deploy = self.find(id).await?;
        if deploy.is_terminal() {
            debug!("Deployment {} already finished, not simulating", id);
            return Ok(false);
        }

        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if runs.get(&id).is_some_and(RunHandle::is_live) {
            return Ok(false);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let run = SimulationRun {
            id,
            generation,
            registry: self.registry.clone(),
            runs: self.runs.clone(),
            events: self.events.clone(),
            options: self.options.clone(),
        };
        let provider_ids = deploy.provider_ids();
        let task = tokio::spawn(run.drive(deploy, cancel_rx));
        runs.insert(
            id,
            RunHandle {
                generation,
                provider_ids,
                cancel: Some(cancel_tx),
                task,
            },
        );

        info!("Simulation started for deployment {}", id);
        Ok(true)
    }

    async fn find(&self, id: u64) -> Result<Deploy, SimError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| SimError::NotFound(format!("Deployment {}", id)))
    }

    /// Stop scheduling ticks for a deployment. Returns false if no run was live.
    pub fn cancel(&self, id: u64) -> bool {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        match runs.get_mut(&id) {
            Some(run) if run.is_live() => {
                run.cancel.take();
                info!("Simulation cancelled for deployment {}", id);
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self, id: u64) -> bool {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.get(&id).is_some_and(RunHandle::is_live)
    }

    /// Ids with a live run, ascending
    pub fn running_ids(&self) -> Vec<u64> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<u64> = runs
            .iter()
            .filter(|(_, run)| run.is_live())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Start runs for every unfinished deployment. Returns how many started.
    pub async fn resume_active(&self) -> usize {
        let mut started = 0;
        for id in self.registry.active_ids().await {
            match self.start(id).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => debug!("Not resuming deployment {}: {}", id, e),
            }
        }
        if started > 0 {
            info!("Resumed {} unfinished deployments", started);
        }
        started
    }

    /// Cancel every run and wait for them to stop
    pub async fn shutdown(&self) {
        let handles: Vec<RunHandle> = {
            let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.drain().map(|(_, run)| run).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!("Stopping {} simulation runs...", handles.len());
        for mut handle in handles {
            handle.cancel.take();
            let _ = handle.task.await;
        }
    }
}

enum TickResult {
    Continue,
    Finished,
    Orphaned,
}

/// The task side of one run
struct SimulationRun {
    id: u64,
    generation: u64,
    registry: Arc<Registry>,
    runs: RunMap,
    events: broadcast::Sender<Deploy>,
    options: SimulatorOptions,
}

impl SimulationRun {
    async fn drive(self, initial: Deploy, mut cancel_rx: oneshot::Receiver<()>) {
        let mut state = RunState::resume(Instant::now(), &initial);

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    debug!("Simulation for deployment {} stopping", self.id);
                    break;
                }
                _ = tokio::time::sleep(self.options.tick_interval) => {}
            }

            match self.tick(&mut state).await {
                TickResult::Continue => {}
                TickResult::Finished => {
                    info!(
                        "Deployment {} completed after {} ticks",
                        self.id,
                        state.ticks()
                    );
                    break;
                }
                TickResult::Orphaned => {
                    debug!("Deployment {} vanished, ending its simulation", self.id);
                    break;
                }
            }
        }

        self.release();
    }

    async fn tick(&self, state: &mut RunState) -> TickResult {
        let ids = self.registry.ids();
        let settings = &self.options.tick;
        let updated = self
            .registry
            .update(self.id, |deploy| {
                // The id may have been reused by a deployment created after ours was removed
                if !state.tracks(deploy) {
                    return None;
                }
                Some(apply_tick(deploy, state, ids, settings, Instant::now(), Utc::now()))
            })
            .await;

        let Some((Some(outcome), snapshot)) = updated else {
            return TickResult::Orphaned;
        };

        debug!(
            "Deployment {} at {}% ({} new log lines)",
            self.id, outcome.progress, outcome.emitted
        );
        // No subscribers is fine
        let _ = self.events.send(snapshot);

        if outcome.completed {
            TickResult::Finished
        } else {
            TickResult::Continue
        }
    }

    /// Drop this run's handle unless a newer run replaced it
    fn release(&self) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if runs.get(&self.id).is_some_and(|run| run.generation == self.generation) {
            runs.remove(&self.id);
        }
    }
}
