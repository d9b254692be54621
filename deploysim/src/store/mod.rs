//! Persistent store for the deployment collection
//!
//! Loads and saves never fail towards the caller: an unreadable payload loads
//! as an empty collection and a failed save is logged, after which the store
//! backs off before touching the backend again. The in-memory registry stays
//! authoritative in the meantime.

pub mod backend;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::models::deployment::Deploy;
use crate::utils::{calc_exp_backoff, CooldownOptions};

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend};

/// Store options
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound for a single backend call
    pub io_timeout: Duration,

    /// Backoff applied after failed saves
    pub cooldown: CooldownOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(2),
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The backend holds the collection
    Saved,
    /// Skipped because an earlier failure put the store in cooldown
    Deferred,
    /// The backend rejected the write or timed out
    Failed,
}

#[derive(Debug, Default)]
struct PersistState {
    err_streak: u32,
    cooldown_ends_at: Option<Instant>,
    dirty: bool,
}

impl PersistState {
    fn is_in_cooldown(&self) -> bool {
        self.cooldown_ends_at.is_some_and(|ends| Instant::now() < ends)
    }
}

/// Soft-failing wrapper around a [`StoreBackend`]
pub struct PersistentStore {
    backend: Arc<dyn StoreBackend>,
    options: StoreOptions,
    state: Mutex<PersistState>,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn StoreBackend>, options: StoreOptions) -> Self {
        Self {
            backend,
            options,
            state: Mutex::new(PersistState::default()),
        }
    }

    /// Last persisted collection, or an empty one if there is none or it is unreadable
    pub async fn load(&self) -> Vec<Deploy> {
        match tokio::time::timeout(self.options.io_timeout, self.backend.read()).await {
            Ok(Ok(Some(deploys))) => {
                info!("Loaded {} deployments from store", deploys.len());
                deploys
            }
            Ok(Ok(None)) => {
                debug!("Store is empty, starting with no deployments");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!("Stored deployments are unreadable, starting empty: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Loading deployments timed out after {:?}, starting empty",
                    self.options.io_timeout
                );
                Vec::new()
            }
        }
    }

    /// Replace the persisted collection unless the store is cooling down
    pub async fn save(&self, deploys: &[Deploy]) -> SaveOutcome {
        let mut state = self.state.lock().await;
        if state.is_in_cooldown() {
            debug!("Store in cooldown, deferring save of {} deployments", deploys.len());
            state.dirty = true;
            return SaveOutcome::Deferred;
        }
        self.write(&mut state, deploys).await
    }

    /// Replace the persisted collection, ignoring any cooldown
    pub async fn flush(&self, deploys: &[Deploy]) -> SaveOutcome {
        let mut state = self.state.lock().await;
        self.write(&mut state, deploys).await
    }

    /// True when the latest collection has not reached the backend yet
    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    async fn write(&self, state: &mut PersistState, deploys: &[Deploy]) -> SaveOutcome {
        let result = tokio::time::timeout(self.options.io_timeout, self.backend.write(deploys)).await;
        let err = match result {
            Ok(Ok(())) => {
                state.err_streak = 0;
                state.cooldown_ends_at = None;
                state.dirty = false;
                return SaveOutcome::Saved;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.options.io_timeout),
        };

        state.err_streak += 1;
        state.dirty = true;
        let cooldown = calc_exp_backoff(&self.options.cooldown, state.err_streak - 1);
        state.cooldown_ends_at = Some(Instant::now() + cooldown);
        error!(
            "Failed to persist deployments (attempt {}), retrying in {:?}: {}",
            state.err_streak, cooldown, err
        );
        SaveOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::file::File;
    use chrono::Utc;

    fn sample(id: u64) -> Deploy {
        let now = Utc::now();
        Deploy {
            id,
            repo_url: "https://github.com/acme/app".to_string(),
            progress: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            providers: vec![],
        }
    }

    #[tokio::test]
    async fn test_load_empty_backend() {
        let store = PersistentStore::new(Arc::new(MemoryBackend::new()), StoreOptions::default());
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("deployments.json"));
        file.write_atomic(b"[{\"id\": \"nope\"").await.unwrap();

        let store = PersistentStore::new(Arc::new(JsonFileBackend::new(file)), StoreOptions::default());
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("deployments.json"));
        let store = PersistentStore::new(
            Arc::new(JsonFileBackend::new(file.clone())),
            StoreOptions::default(),
        );

        let deploys = vec![sample(1), sample(2)];
        assert_eq!(store.save(&deploys).await, SaveOutcome::Saved);

        let reopened = PersistentStore::new(Arc::new(JsonFileBackend::new(file)), StoreOptions::default());
        assert_eq!(reopened.load().await, deploys);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_defers_until_cooldown_ends() {
        let backend = Arc::new(MemoryBackend::new());
        let store = PersistentStore::new(backend.clone(), StoreOptions::default());
        backend.set_fail_writes(true);

        assert_eq!(store.save(&[sample(1)]).await, SaveOutcome::Failed);
        assert_eq!(store.save(&[sample(1)]).await, SaveOutcome::Deferred);
        assert!(store.is_dirty().await);

        backend.set_fail_writes(false);
        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.save(&[sample(1), sample(2)]).await, SaveOutcome::Saved);
        assert!(!store.is_dirty().await);
        assert_eq!(backend.contents().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_ignores_cooldown() {
        let backend = Arc::new(MemoryBackend::new());
        let store = PersistentStore::new(backend.clone(), StoreOptions::default());
        backend.set_fail_writes(true);
        assert_eq!(store.save(&[sample(1)]).await, SaveOutcome::Failed);

        backend.set_fail_writes(false);
        assert_eq!(store.flush(&[sample(1)]).await, SaveOutcome::Saved);
        assert_eq!(backend.write_count(), 1);
    }
}
