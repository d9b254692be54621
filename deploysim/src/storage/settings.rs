//! Settings file management

use serde::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::registry::CatalogPolicy;

/// Simulator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to the rolling files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Progress simulation configuration
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Persistent store configuration
    #[serde(default)]
    pub store: StoreSettings,

    /// How creation treats slugs missing from the provider catalog
    #[serde(default)]
    pub catalog_policy: CatalogPolicy,

    /// Polling cadence recommended to readers
    #[serde(default)]
    pub polling: PollingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            simulation: SimulationSettings::default(),
            store: StoreSettings::default(),
            catalog_policy: CatalogPolicy::default(),
            polling: PollingSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from disk, falling back to defaults when the file is absent
    pub async fn load(file: &File) -> Result<Self, SimError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await.map_err(|e| {
            SimError::ConfigError(format!(
                "Unable to read settings file {}: {}",
                file.path().display(),
                e
            ))
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Progress simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Delay between two ticks of one deployment
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Progress added per tick
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,

    /// Minimum delay between two log emissions of one run
    #[serde(default = "default_log_emission_interval_ms")]
    pub log_emission_interval_ms: u64,

    /// Restart runs for unfinished deployments found at startup
    #[serde(default = "default_true")]
    pub resume_active: bool,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_progress_step() -> u8 {
    5
}

fn default_log_emission_interval_ms() -> u64 {
    800
}

fn default_true() -> bool {
    true
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            progress_step: default_progress_step(),
            log_emission_interval_ms: default_log_emission_interval_ms(),
            resume_active: true,
        }
    }
}

/// Persistent store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Upper bound for a single load or save
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// First cooldown after a failed save
    #[serde(default = "default_cooldown_base_ms")]
    pub cooldown_base_ms: u64,

    /// Longest cooldown after repeated failed saves
    #[serde(default = "default_cooldown_max_ms")]
    pub cooldown_max_ms: u64,
}

fn default_io_timeout_ms() -> u64 {
    2000
}

fn default_cooldown_base_ms() -> u64 {
    1000
}

fn default_cooldown_max_ms() -> u64 {
    60_000
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            io_timeout_ms: default_io_timeout_ms(),
            cooldown_base_ms: default_cooldown_base_ms(),
            cooldown_max_ms: default_cooldown_max_ms(),
        }
    }
}

/// Polling cadence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_deploy_active_ms")]
    pub deploy_active_ms: u64,

    #[serde(default = "default_deploy_settled_ms")]
    pub deploy_settled_ms: u64,

    #[serde(default = "default_logs_active_ms")]
    pub logs_active_ms: u64,

    #[serde(default = "default_logs_idle_ms")]
    pub logs_idle_ms: u64,
}

fn default_deploy_active_ms() -> u64 {
    3000
}

fn default_deploy_settled_ms() -> u64 {
    10_000
}

fn default_logs_active_ms() -> u64 {
    1000
}

fn default_logs_idle_ms() -> u64 {
    30_000
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            deploy_active_ms: default_deploy_active_ms(),
            deploy_settled_ms: default_deploy_settled_ms(),
            logs_active_ms: default_logs_active_ms(),
            logs_idle_ms: default_logs_idle_ms(),
        }
    }
}
