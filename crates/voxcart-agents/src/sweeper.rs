//! Background sweep of finished agents.
//!
//! Calls [`AgentOrchestrator::cleanup`] on a fixed interval until shut down.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::orchestrator::AgentOrchestrator;

pub struct CleanupSweeper {
    orchestrator: Arc<AgentOrchestrator>,
    shutdown: Arc<Notify>,
}

impl CleanupSweeper {
    pub fn new(orchestrator: Arc<AgentOrchestrator>) -> Self {
        Self {
            orchestrator,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Sweep every `cleanup_interval` until [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        let interval = self.orchestrator.cleanup_interval();
        tracing::debug!(interval_secs = interval.as_secs(), "Cleanup sweeper started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.orchestrator.cleanup();
                }
                _ = self.shutdown.notified() => {
                    tracing::debug!("Cleanup sweeper stopped");
                    return;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
