//! Server state

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::polling::PollingPolicy;
use crate::registry::Registry;
use crate::simulator::Simulator;

/// Server state shared across handlers
pub struct ServerState {
    pub registry: Arc<Registry>,
    pub simulator: Arc<Simulator>,
    pub polling: PollingPolicy,

    /// Fired once when the app starts shutting down; long-lived responses end on it
    pub shutdown: broadcast::Sender<()>,
}

impl ServerState {
    pub fn new(
        registry: Arc<Registry>,
        simulator: Arc<Simulator>,
        polling: PollingPolicy,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            registry,
            simulator,
            polling,
            shutdown,
        }
    }
}
