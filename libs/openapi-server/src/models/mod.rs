//! Deploysim API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body returned with 4xx/5xx statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Deployment creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeployRequest {
    /// GitHub repository to deploy
    #[serde(alias = "github_repo_url")]
    pub repo_url: String,

    /// Provider slugs drawn from the catalog
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Deployment with its providers and their logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub id: u64,
    pub repo_url: String,
    pub status: String,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub providers: Vec<ProviderResponse>,
}

/// Per-provider state of a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub id: u64,
    pub slug: String,
    pub status: String,
    pub logs: Vec<LogResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single deployment log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogResponse {
    pub id: u64,
    pub deploy_id: u64,
    pub provider_id: u64,
    pub provider_slug: String,
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Log list query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    pub provider: Option<String>,
    pub level: Option<String>,
}

/// Provider catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProviderResponse {
    pub slug: String,
    pub name: String,
    pub status: String,
}
