//! Application state management

use std::sync::Arc;

use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::errors::SimError;
use crate::models::catalog::ProviderCatalog;
use crate::registry::Registry;
use crate::simulator::Simulator;
use crate::store::{JsonFileBackend, PersistentStore, SaveOutcome, StoreBackend};

/// Main application state
pub struct AppState {
    /// Owner of the deployment collection
    pub registry: Arc<Registry>,

    /// Drives every running deployment
    pub simulator: Arc<Simulator>,
}

impl AppState {
    /// Open the on-disk store and build the registry and simulator on top of it
    pub async fn init(options: &AppOptions) -> Result<Self, SimError> {
        let layout = &options.storage.layout;
        layout.setup().await?;

        let backend = Arc::new(JsonFileBackend::new(layout.deployments_file()));
        Ok(Self::with_backend(backend, options).await)
    }

    /// Build the state on an arbitrary backend
    pub async fn with_backend(backend: Arc<dyn StoreBackend>, options: &AppOptions) -> Self {
        let store = Arc::new(PersistentStore::new(backend, options.storage.store.clone()));
        let registry = Arc::new(
            Registry::open(store, ProviderCatalog::default(), options.catalog_policy).await,
        );
        let simulator = Arc::new(Simulator::new(registry.clone(), options.simulator.clone()));

        Self {
            registry,
            simulator,
        }
    }

    /// Stop every run, then write the final collection
    pub async fn shutdown(&self) -> Result<(), SimError> {
        info!("Stopping simulations...");
        self.simulator.shutdown().await;

        info!("Flushing deployments...");
        match self.registry.flush().await {
            SaveOutcome::Saved => Ok(()),
            outcome => {
                error!("Final flush did not reach the store ({:?})", outcome);
                Err(SimError::PersistenceError(
                    "unable to flush deployments at shutdown".to_string(),
                ))
            }
        }
    }
}
