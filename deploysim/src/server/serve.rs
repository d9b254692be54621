//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::SimError;
use crate::server::handlers::{
    create_deployment_handler, delete_deployment_handler, deployment_events_handler,
    deployment_logs_handler, get_deployment_handler, health_handler, list_deployments_handler,
    providers_handler, version_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Catalog
        .route("/providers", get(providers_handler))
        // Deployments
        .route(
            "/deployments",
            get(list_deployments_handler).post(create_deployment_handler),
        )
        .route(
            "/deployments/{id}",
            get(get_deployment_handler).delete(delete_deployment_handler),
        )
        .route("/deployments/{id}/logs", get(deployment_logs_handler))
        .route("/deployments/{id}/events", get(deployment_events_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), SimError>>, SimError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SimError::ServerError(format!("Unable to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| SimError::ServerError(e.to_string()))
    });

    Ok(handle)
}
