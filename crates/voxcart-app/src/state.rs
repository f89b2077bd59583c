//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use voxcart_agents::AgentOrchestrator;
use voxcart_calls::CallSessionManager;
use voxcart_core::config::VoxcartConfig;
use voxcart_storage::CallRepository;

/// Shared application state. All fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VoxcartConfig>,
    pub calls: Arc<CallSessionManager>,
    pub orchestrator: Arc<AgentOrchestrator>,
    /// Persisted call history; `None` when running without a database.
    pub call_records: Option<CallRepository>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: VoxcartConfig,
        calls: Arc<CallSessionManager>,
        call_records: Option<CallRepository>,
    ) -> Self {
        let orchestrator = Arc::clone(calls.orchestrator());
        Self {
            config: Arc::new(config),
            calls,
            orchestrator,
            call_records,
            start_time: Instant::now(),
        }
    }
}
