//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::SimError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the deployment simulator until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SimError> {
    info!("Initializing deployment simulator...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start simulator: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), SimError> {
    let app_state = Arc::new(AppState::init(options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.resume_active {
        app_state.simulator.resume_active().await;
    }

    if options.enable_server {
        init_server(options, app_state, shutdown_manager, shutdown_tx).await?;
    }

    Ok(())
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<(), SimError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(
        app_state.registry.clone(),
        app_state.simulator.clone(),
        options.polling.clone(),
        shutdown_tx.clone(),
    );

    let mut shutdown_rx = shutdown_tx.subscribe();
    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), SimError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), SimError> {
        if self.app_state.is_some() {
            return Err(SimError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), SimError>>,
    ) -> Result<(), SimError> {
        if self.server_handle.is_some() {
            return Err(SimError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SimError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                );
                Err(SimError::Timeout(format!(
                    "shutdown exceeded {:?}",
                    self.lifecycle_options.max_shutdown_delay
                )))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), SimError> {
        info!("Shutting down deployment simulator...");

        // 1. HTTP server, bounded so it cannot hold back the flush
        let server_result = match self.server_handle.take() {
            Some(handle) => self.stop_server(handle).await,
            None => Ok(()),
        };

        // 2. Simulation runs and final flush
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        server_result?;
        info!("Shutdown complete");
        Ok(())
    }

    async fn stop_server(&self, mut handle: JoinHandle<Result<(), SimError>>) -> Result<(), SimError> {
        let drain_delay = self.lifecycle_options.max_server_drain_delay;
        match tokio::time::timeout(drain_delay, &mut handle).await {
            Ok(joined) => joined.map_err(|e| SimError::ShutdownError(e.to_string()))?,
            Err(_) => {
                warn!(
                    "HTTP server still draining after {:?}, closing remaining connections",
                    drain_delay
                );
                handle.abort();
                Ok(())
            }
        }
    }
}
