//! Conversions from domain models to wire models

use std::time::Duration;

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::{
    CatalogProviderResponse, DeployResponse, ErrorResponse, LogResponse, ProviderResponse,
};

use crate::errors::SimError;
use crate::models::catalog::CatalogProvider;
use crate::models::deployment::{Deploy, LogEntry, LogRecord, ProviderState};

/// Recommended re-fetch delay attached to deployment and log reads
pub const POLL_INTERVAL_HEADER: HeaderName = HeaderName::from_static("x-poll-interval-ms");

pub fn deploy_response(deploy: &Deploy) -> DeployResponse {
    DeployResponse {
        id: deploy.id,
        repo_url: deploy.repo_url.clone(),
        status: deploy.status().as_str().to_string(),
        progress: deploy.progress,
        created_at: deploy.created_at,
        updated_at: deploy.updated_at,
        completed_at: deploy.completed_at,
        providers: deploy.providers.iter().map(provider_response).collect(),
    }
}

fn provider_response(provider: &ProviderState) -> ProviderResponse {
    ProviderResponse {
        id: provider.id,
        slug: provider.slug.clone(),
        status: provider.status.as_str().to_string(),
        logs: provider
            .logs
            .iter()
            .map(|entry| log_response(&provider.slug, entry))
            .collect(),
        created_at: provider.created_at,
        updated_at: provider.updated_at,
    }
}

fn log_response(provider_slug: &str, entry: &LogEntry) -> LogResponse {
    LogResponse {
        id: entry.id,
        deploy_id: entry.deploy_id,
        provider_id: entry.provider_id,
        provider_slug: provider_slug.to_string(),
        level: entry.level.as_str().to_string(),
        message: entry.message.clone(),
        timestamp: entry.timestamp,
    }
}

pub fn log_record_response(record: &LogRecord) -> LogResponse {
    log_response(&record.provider_slug, &record.entry)
}

pub fn catalog_provider_response(provider: &CatalogProvider) -> CatalogProviderResponse {
    CatalogProviderResponse {
        slug: provider.slug.clone(),
        name: provider.name.clone(),
        status: provider.status.as_str().to_string(),
    }
}

/// Attach the polling header when an interval is recommended
pub fn with_poll_interval(mut response: Response, interval: Option<Duration>) -> Response {
    if let Some(interval) = interval {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        response
            .headers_mut()
            .insert(POLL_INTERVAL_HEADER, HeaderValue::from(millis));
    }
    response
}

impl IntoResponse for SimError {
    fn into_response(self) -> Response {
        let status = match &self {
            SimError::ValidationError(_) => StatusCode::BAD_REQUEST,
            SimError::NotFound(_) => StatusCode::NOT_FOUND,
            SimError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = match self {
            SimError::ValidationError(message) => message,
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}
