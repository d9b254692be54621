//! Deployment registry
//!
//! Authoritative in-memory collection of deployments. Every mutation is
//! followed by a save of the whole collection through the persistent store.

pub mod ids;
pub mod validate;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::errors::SimError;
use crate::models::catalog::ProviderCatalog;
use crate::models::deployment::{Deploy, LogFilter, LogRecord, ProviderState, MAX_PROGRESS};
use crate::store::{PersistentStore, SaveOutcome};

pub use ids::IdSequence;
pub use validate::{normalize_slugs, validate_repo_url, CatalogPolicy};

/// Owner of the deployment collection
pub struct Registry {
    store: Arc<PersistentStore>,
    catalog: ProviderCatalog,
    policy: CatalogPolicy,
    deploys: RwLock<BTreeMap<u64, Deploy>>,
    ids: IdSequence,
    persist_lock: Mutex<()>,
}

impl Registry {
    /// Load the persisted collection and take ownership of it
    pub async fn open(
        store: Arc<PersistentStore>,
        catalog: ProviderCatalog,
        policy: CatalogPolicy,
    ) -> Self {
        let mut deploys = BTreeMap::new();
        for mut deploy in store.load().await {
            if deploy.progress > MAX_PROGRESS {
                warn!(
                    "Deployment {} was stored with progress {}, clamping to {}",
                    deploy.id, deploy.progress, MAX_PROGRESS
                );
                deploy.progress = MAX_PROGRESS;
            }
            if deploys.insert(deploy.id, deploy).is_some() {
                warn!("Duplicate deployment id in store, keeping the last record");
            }
        }

        let last_child_id = deploys.values().map(Deploy::max_child_id).max().unwrap_or(0);
        info!(
            "Registry opened with {} deployments (next child id {})",
            deploys.len(),
            last_child_id + 1
        );

        Self {
            store,
            catalog,
            policy,
            deploys: RwLock::new(deploys),
            ids: IdSequence::starting_after(last_child_id),
            persist_lock: Mutex::new(()),
        }
    }

    /// Provider catalog consulted by [`Registry::create`]
    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Id source for providers and log entries
    pub fn ids(&self) -> &IdSequence {
        &self.ids
    }

    /// Validate and record a new deployment with every provider pending.
    ///
    /// Nothing is written when validation fails.
    pub async fn create(&self, repo_url: &str, provider_slugs: &[String]) -> Result<Deploy, SimError> {
        validate_repo_url(repo_url)?;
        let slugs = normalize_slugs(provider_slugs, &self.catalog, self.policy)?;

        let deploy = {
            let mut deploys = self.deploys.write().await;
            let id = deploys.keys().next_back().map_or(1, |last| last + 1);
            let now = Utc::now();
            let deploy = Deploy {
                id,
                repo_url: repo_url.to_string(),
                progress: 0,
                created_at: now,
                updated_at: now,
                completed_at: None,
                providers: slugs
                    .iter()
                    .map(|slug| ProviderState::new(self.ids.next_id(), slug.as_str(), now))
                    .collect(),
            };
            deploys.insert(id, deploy.clone());
            deploy
        };

        info!(
            "Created deployment {} for {} on [{}]",
            deploy.id,
            deploy.repo_url,
            slugs.join(", ")
        );
        self.persist().await;
        Ok(deploy)
    }

    /// Look up one deployment
    pub async fn get(&self, id: u64) -> Option<Deploy> {
        self.deploys.read().await.get(&id).cloned()
    }

    /// All deployments, newest first
    pub async fn list(&self) -> Vec<Deploy> {
        let mut deploys: Vec<Deploy> = self.deploys.read().await.values().cloned().collect();
        deploys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        deploys
    }

    /// Logs of one deployment, oldest first; `None` for unknown ids
    pub async fn logs(&self, id: u64, filter: &LogFilter) -> Option<Vec<LogRecord>> {
        self.deploys.read().await.get(&id).map(|d| d.logs(filter))
    }

    /// Ids of deployments that are still pending or in progress
    pub async fn active_ids(&self) -> Vec<u64> {
        self.deploys
            .read()
            .await
            .values()
            .filter(|d| d.is_active())
            .map(|d| d.id)
            .collect()
    }

    /// Mutate one deployment in place and persist the collection.
    ///
    /// Returns the closure's result and the updated snapshot, or `None` when
    /// the id is unknown (nothing is persisted then).
    pub async fn update<R>(&self, id: u64, mutate: impl FnOnce(&mut Deploy) -> R) -> Option<(R, Deploy)> {
        let updated = {
            let mut deploys = self.deploys.write().await;
            let deploy = deploys.get_mut(&id)?;
            let result = mutate(deploy);
            (result, deploy.clone())
        };
        self.persist().await;
        Some(updated)
    }

    /// Delete a deployment and persist the collection
    pub async fn remove(&self, id: u64) -> Option<Deploy> {
        let removed = self.deploys.write().await.remove(&id)?;
        info!("Removed deployment {}", id);
        self.persist().await;
        Some(removed)
    }

    /// Write the collection even if the store is cooling down
    pub async fn flush(&self) -> SaveOutcome {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.store.flush(&snapshot).await
    }

    async fn persist(&self) -> SaveOutcome {
        // Snapshot under the persist lock so an older snapshot is never
        // written after a newer one.
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        let outcome = self.store.save(&snapshot).await;
        if outcome != SaveOutcome::Saved {
            debug!("Deployment collection not persisted ({:?})", outcome);
        }
        outcome
    }

    async fn snapshot(&self) -> Vec<Deploy> {
        self.deploys.read().await.values().cloned().collect()
    }
}
