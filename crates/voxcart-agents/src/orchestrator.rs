//! Agent orchestrator.
//!
//! Owns the active-agent set across calls. Each call has at most one entry;
//! replacing an agent is always cancel-then-create. Agent events are
//! relayed onto a broadcast channel with the call id and run duration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use voxcart_core::config::AgentsConfig;
use voxcart_core::types::{CallId, Timestamp};

use crate::agent::{Agent, AgentDeps, AgentPolicy};
use crate::commerce::CommerceConnector;
use crate::error::AgentError;
use crate::handler::AgentRegistry;
use crate::store::ActionStore;
use crate::types::{
    AgentEvent, AgentState, AgentStats, AgentType, FieldMap, OrchestratorEvent,
};

const EVENT_CAPACITY: usize = 256;

struct ActiveAgentEntry {
    agent: Arc<Agent>,
    started: Instant,
    started_at: Timestamp,
}

/// Read-only view of one active entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAgentInfo {
    pub call_id: CallId,
    pub agent_type: AgentType,
    pub state: AgentState,
    pub started_at: Timestamp,
    pub age_secs: u64,
    pub pending_field: Option<String>,
}

pub struct AgentOrchestrator {
    registry: AgentRegistry,
    deps: AgentDeps,
    execution_timeout: Duration,
    retention: Duration,
    cleanup_interval: Duration,
    active: Mutex<HashMap<CallId, ActiveAgentEntry>>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl AgentOrchestrator {
    pub fn new(
        registry: AgentRegistry,
        commerce: Arc<dyn CommerceConnector>,
        store: Arc<dyn ActionStore>,
        config: &AgentsConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry,
            deps: AgentDeps {
                commerce,
                store,
                policy: Arc::new(AgentPolicy::from_config(config)),
            },
            execution_timeout: Duration::from_secs(config.execution_timeout_secs),
            retention: Duration::from_secs(config.retention_secs),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
            active: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallId, ActiveAgentEntry>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lifecycle events for every call.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Launch an agent for a call, or feed `data` to the live agent of the
    /// same type. A live agent of another type is cancelled first.
    pub fn launch_agent(
        &self,
        call_id: &CallId,
        agent_type: AgentType,
        data: FieldMap,
    ) -> Result<Arc<Agent>, AgentError> {
        let handler = self
            .registry
            .get(agent_type)
            .ok_or(AgentError::UnregisteredAgent(agent_type))?;

        let agent = {
            let mut active = self.lock();

            if let Some(entry) = active.get(call_id) {
                let existing = &entry.agent;
                if existing.agent_type() == agent_type && !existing.state().is_terminal() {
                    tracing::debug!(
                        call_id = %call_id,
                        agent_type = %agent_type,
                        "Agent already active, merging data"
                    );
                    let existing = Arc::clone(existing);
                    drop(active);
                    existing.update_data(data);
                    return Ok(existing);
                }
            }

            if let Some(previous) = active.remove(call_id) {
                self.retire(&previous.agent);
            }

            let (agent, rx) = Agent::new(
                call_id.clone(),
                handler,
                data,
                self.deps.clone(),
                self.execution_timeout,
            );
            let started = Instant::now();
            self.spawn_relay(call_id.clone(), agent_type, started, rx);
            active.insert(
                call_id.clone(),
                ActiveAgentEntry {
                    agent: Arc::clone(&agent),
                    started,
                    started_at: Timestamp::now(),
                },
            );
            agent
        };

        tracing::info!(call_id = %call_id, agent_type = %agent_type, "Agent launched");
        agent.start();
        Ok(agent)
    }

    /// Launch by registry name ("ReturnAgent", "CODAgent", ...).
    pub fn launch_agent_by_name(
        &self,
        call_id: &CallId,
        name: &str,
        data: FieldMap,
    ) -> Result<Arc<Agent>, AgentError> {
        let agent_type: AgentType = name
            .parse()
            .map_err(|_| AgentError::UnknownAgentType(name.to_string()))?;
        self.launch_agent(call_id, agent_type, data)
    }

    /// Forward caller input to the call's agent. `false` when there is no
    /// agent or it has already finished.
    pub fn update_agent(&self, call_id: &CallId, data: FieldMap) -> bool {
        match self.get_agent(call_id) {
            Some(agent) => agent.update_data(data),
            None => false,
        }
    }

    /// Cancel and remove the call's agent. `false` when there was none.
    pub fn cancel_agent(&self, call_id: &CallId) -> bool {
        let removed = self.lock().remove(call_id);
        match removed {
            Some(entry) => {
                self.retire(&entry.agent);
                true
            }
            None => false,
        }
    }

    /// Cancel every agent. Used on shutdown.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<ActiveAgentEntry> = self.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            self.retire(&entry.agent);
        }
        drained.len()
    }

    fn retire(&self, agent: &Arc<Agent>) {
        if agent.cancel() {
            let _ = self.events.send(OrchestratorEvent::AgentCancelled {
                call_id: agent.call_id().clone(),
                agent_type: agent.agent_type(),
            });
        }
    }

    fn spawn_relay(
        &self,
        call_id: CallId,
        agent_type: AgentType,
        started: Instant,
        mut rx: mpsc::UnboundedReceiver<AgentEvent>,
    ) {
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let relayed = match event {
                    AgentEvent::NeedInfo { field, prompt } => OrchestratorEvent::AgentNeedsInfo {
                        call_id: call_id.clone(),
                        agent_type,
                        field,
                        prompt,
                    },
                    AgentEvent::Completed(result) => OrchestratorEvent::AgentCompleted {
                        call_id: call_id.clone(),
                        agent_type,
                        result,
                        duration_ms: started.elapsed().as_millis() as u64,
                    },
                    AgentEvent::Failed(error) => OrchestratorEvent::AgentError {
                        call_id: call_id.clone(),
                        agent_type,
                        error,
                    },
                };
                // No subscribers is fine.
                let _ = events.send(relayed);
            }
        });
    }

    pub fn get_agent(&self, call_id: &CallId) -> Option<Arc<Agent>> {
        self.lock().get(call_id).map(|entry| Arc::clone(&entry.agent))
    }

    pub fn get_agent_state(&self, call_id: &CallId) -> Option<AgentState> {
        self.get_agent(call_id).map(|agent| agent.state())
    }

    /// Whether the call has an agent that has not finished.
    pub fn has_active_agent(&self, call_id: &CallId) -> bool {
        self.get_agent_state(call_id)
            .map(|state| !state.is_terminal())
            .unwrap_or(false)
    }

    pub fn get_all_active_agents(&self) -> Vec<ActiveAgentInfo> {
        let mut infos: Vec<ActiveAgentInfo> = self
            .lock()
            .iter()
            .map(|(call_id, entry)| ActiveAgentInfo {
                call_id: call_id.clone(),
                agent_type: entry.agent.agent_type(),
                state: entry.agent.state(),
                started_at: entry.started_at,
                age_secs: entry.started.elapsed().as_secs(),
                pending_field: entry.agent.pending_field(),
            })
            .collect();
        infos.sort_by(|a, b| a.call_id.cmp(&b.call_id));
        infos
    }

    pub fn get_agent_stats(&self) -> AgentStats {
        let active = self.lock();
        let mut stats = AgentStats {
            total: active.len(),
            ..AgentStats::default()
        };
        for entry in active.values() {
            *stats
                .by_type
                .entry(entry.agent.agent_type().name().to_string())
                .or_default() += 1;
            *stats
                .by_state
                .entry(entry.agent.state().to_string())
                .or_default() += 1;
        }
        stats
    }

    /// Drop completed and failed entries older than the retention period.
    /// Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut active = self.lock();
        let before = active.len();
        let retention = self.retention;
        active.retain(|call_id, entry| {
            let finished = matches!(
                entry.agent.state(),
                AgentState::Completed | AgentState::Error
            );
            let expired = finished && entry.started.elapsed() > retention;
            if expired {
                tracing::debug!(call_id = %call_id, "Sweeping finished agent");
            }
            !expired
        });
        let removed = before - active.len();
        if removed > 0 {
            tracing::info!(removed, remaining = active.len(), "Agent cleanup");
        }
        removed
    }
}
