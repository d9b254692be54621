//! Application configuration options

use std::time::Duration;

use crate::polling::PollingPolicy;
use crate::registry::CatalogPolicy;
use crate::simulator::{SimulatorOptions, TickSettings};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::store::StoreOptions;
use crate::utils::CooldownOptions;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Enable local HTTP server
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Simulation timing
    pub simulator: SimulatorOptions,

    /// Restart runs for unfinished deployments at startup
    pub resume_active: bool,

    /// Treatment of slugs missing from the catalog
    pub catalog_policy: CatalogPolicy,

    /// Re-fetch intervals advertised to readers
    pub polling: PollingPolicy,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            enable_server: true,
            server: ServerOptions::default(),
            simulator: SimulatorOptions::default(),
            resume_active: true,
            catalog_policy: CatalogPolicy::default(),
            polling: PollingPolicy::default(),
        }
    }
}

impl AppOptions {
    /// Options for `settings`, storing data under `layout`
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let simulation = &settings.simulation;
        let store = &settings.store;
        let polling = &settings.polling;

        Self {
            storage: StorageOptions {
                layout,
                store: StoreOptions {
                    io_timeout: Duration::from_millis(store.io_timeout_ms),
                    cooldown: CooldownOptions {
                        base_delay: Duration::from_millis(store.cooldown_base_ms),
                        max_delay: Duration::from_millis(store.cooldown_max_ms),
                        ..Default::default()
                    },
                },
            },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            simulator: SimulatorOptions {
                tick_interval: Duration::from_millis(simulation.tick_interval_ms),
                tick: TickSettings {
                    progress_step: simulation.progress_step,
                    emission_interval: Duration::from_millis(simulation.log_emission_interval_ms),
                },
            },
            resume_active: simulation.resume_active,
            catalog_policy: settings.catalog_policy,
            polling: PollingPolicy {
                deploy_active: Duration::from_millis(polling.deploy_active_ms),
                deploy_settled: Duration::from_millis(polling.deploy_settled_ms),
                logs_active: Duration::from_millis(polling.logs_active_ms),
                logs_idle: Duration::from_millis(polling.logs_idle_ms),
            },
            ..Default::default()
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,

    /// Share of that delay the HTTP server gets to drain its connections.
    /// Runs are cancelled and the store flushed whether or not it finishes.
    pub max_server_drain_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
            max_server_drain_delay: Duration::from_secs(10),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Persistent store behaviour
    pub store: StoreOptions,
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
