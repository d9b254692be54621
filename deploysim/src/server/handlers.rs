//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use openapi_server::models::{
    CatalogProviderResponse, CreateDeployRequest, DeployResponse, HealthResponse, LogQuery,
    LogResponse, VersionResponse,
};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::errors::SimError;
use crate::models::deployment::{Deploy, DeployLogLevel, LogFilter};
use crate::server::responses::{
    catalog_provider_response, deploy_response, log_record_response, with_poll_interval,
};
use crate::server::state::ServerState;
use crate::simulator::Simulator;
use crate::utils::version_info;

/// How often an event stream checks that its deployment still has a live run
const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deploysim".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Provider catalog handler
pub async fn providers_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let providers: Vec<CatalogProviderResponse> = state
        .registry
        .catalog()
        .all()
        .iter()
        .map(catalog_provider_response)
        .collect();
    Json(providers)
}

/// List all deployments, newest first
pub async fn list_deployments_handler(State(state): State<Arc<ServerState>>) -> Response {
    let deploys = state.registry.list().await;
    let interval = state.polling.list_refetch_interval(&deploys);
    let body: Vec<DeployResponse> = deploys.iter().map(deploy_response).collect();
    with_poll_interval(Json(body).into_response(), interval)
}

/// Create a deployment and start simulating it
pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateDeployRequest>,
) -> Result<Response, SimError> {
    let deploy = state
        .registry
        .create(&request.repo_url, &request.providers)
        .await?;

    if let Err(e) = state.simulator.start(deploy.id).await {
        error!("Unable to start simulation for deployment {}: {}", deploy.id, e);
    }

    let interval = state.polling.deploy_refetch_interval(&deploy);
    let response = (StatusCode::CREATED, Json(deploy_response(&deploy))).into_response();
    Ok(with_poll_interval(response, Some(interval)))
}

/// Get one deployment
pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<Response, SimError> {
    let deploy = find(&state, id).await?;
    let interval = state.polling.deploy_refetch_interval(&deploy);
    Ok(with_poll_interval(
        Json(deploy_response(&deploy)).into_response(),
        Some(interval),
    ))
}

/// Delete a deployment and cancel its run
pub async fn delete_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, SimError> {
    state.simulator.cancel(id);
    state
        .registry
        .remove(id)
        .await
        .ok_or_else(|| not_found(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Logs of a deployment, optionally filtered by provider and level
pub async fn deployment_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    Query(query): Query<LogQuery>,
) -> Result<Response, SimError> {
    let filter = log_filter(query)?;
    let deploy = find(&state, id).await?;

    let logs: Vec<LogResponse> = deploy.logs(&filter).iter().map(log_record_response).collect();
    let interval = state.polling.log_refetch_interval(deploy.status());
    Ok(with_poll_interval(Json(logs).into_response(), Some(interval)))
}

/// Stream a snapshot of a deployment after each of its ticks.
///
/// The stream ends after the terminal snapshot, once the deployment has no
/// live run (deleted, cancelled or never started), or when the app shuts down.
pub async fn deployment_events_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, SimError> {
    // Subscribe first so no tick slips between the read and the stream
    let events = state.simulator.subscribe();
    let shutdown = state.shutdown.subscribe();
    let current = find(&state, id).await?;

    let feed = SnapshotFeed::new(id, current, events, shutdown, state.simulator.clone());
    let stream = stream::unfold(feed, |mut feed| async move {
        let item = feed.next().await?;
        Some((Ok(item.into_event()), feed))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

/// One message of an event stream
#[derive(Debug)]
enum FeedItem {
    Snapshot(Deploy),
    Lagged(u64),
}

impl FeedItem {
    fn into_event(self) -> Event {
        match self {
            FeedItem::Snapshot(deploy) => {
                let json = serde_json::to_string(&deploy_response(&deploy)).unwrap_or_default();
                Event::default().event("snapshot").data(json)
            }
            FeedItem::Lagged(skipped) => Event::default().comment(format!("lagged {}", skipped)),
        }
    }
}

/// Per-connection view of the simulator's broadcast, restricted to one id
struct SnapshotFeed {
    id: u64,
    pending: Option<Deploy>,
    events: broadcast::Receiver<Deploy>,
    shutdown: broadcast::Receiver<()>,
    liveness: Interval,
    simulator: Arc<Simulator>,
    done: bool,
}

impl SnapshotFeed {
    fn new(
        id: u64,
        current: Deploy,
        events: broadcast::Receiver<Deploy>,
        shutdown: broadcast::Receiver<()>,
        simulator: Arc<Simulator>,
    ) -> Self {
        let mut liveness = tokio::time::interval(LIVENESS_CHECK_INTERVAL);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            id,
            pending: Some(current),
            events,
            shutdown,
            liveness,
            simulator,
            done: false,
        }
    }

    async fn next(&mut self) -> Option<FeedItem> {
        if self.done {
            return None;
        }
        if let Some(deploy) = self.pending.take() {
            return Some(self.snapshot(deploy));
        }

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    debug!("Event stream for deployment {} closed by shutdown", self.id);
                    self.done = true;
                    return None;
                }
                received = self.events.recv() => match received {
                    Ok(deploy) if deploy.id == self.id => return Some(self.snapshot(deploy)),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Event stream for deployment {} lagged by {}", self.id, skipped);
                        return Some(FeedItem::Lagged(skipped));
                    }
                    Err(RecvError::Closed) => {
                        self.done = true;
                        return None;
                    }
                },
                _ = self.liveness.tick() => {
                    if self.simulator.is_running(self.id) {
                        continue;
                    }
                    debug!("Deployment {} has no live run, closing its event stream", self.id);
                    // A run can publish its last snapshot just before it stops
                    let last = self.drain_own();
                    self.done = true;
                    return last.map(|deploy| self.snapshot(deploy));
                }
            }
        }
    }

    /// Newest queued snapshot of this feed's deployment, if any
    fn drain_own(&mut self) -> Option<Deploy> {
        let mut latest = None;
        loop {
            match self.events.try_recv() {
                Ok(deploy) if deploy.id == self.id => latest = Some(deploy),
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
            }
        }
    }

    fn snapshot(&mut self, deploy: Deploy) -> FeedItem {
        // The stream ends after the terminal snapshot
        self.done = self.done || deploy.is_terminal();
        FeedItem::Snapshot(deploy)
    }
}

async fn find(state: &ServerState, id: u64) -> Result<Deploy, SimError> {
    state.registry.get(id).await.ok_or_else(|| not_found(id))
}

fn not_found(id: u64) -> SimError {
    SimError::NotFound(format!("deployment {}", id))
}

fn log_filter(query: LogQuery) -> Result<LogFilter, SimError> {
    let level = query
        .level
        .filter(|level| !level.trim().is_empty())
        .map(|level| level.trim().parse::<DeployLogLevel>())
        .transpose()
        .map_err(SimError::ValidationError)?;
    let provider = query
        .provider
        .map(|slug| slug.trim().to_lowercase())
        .filter(|slug| !slug.is_empty());
    Ok(LogFilter { provider, level })
}
