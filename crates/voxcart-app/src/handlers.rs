//! Read-only status handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use voxcart_agents::{ActiveAgentInfo, AgentResult, AgentStats};
use voxcart_calls::CallInfo;
use voxcart_core::types::{CallId, CallRecord};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: u32 = 20;
const MAX_RECENT_LIMIT: u32 = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_calls: usize,
    pub active_agents: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_calls: state.calls.active_calls().len(),
        active_agents: state.orchestrator.get_all_active_agents().len(),
    })
}

/// GET /api/agents/stats
pub async fn agent_stats(State(state): State<AppState>) -> Json<AgentStats> {
    Json(state.orchestrator.get_agent_stats())
}

#[derive(Debug, Deserialize)]
pub struct CallsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CallsResponse {
    pub active: Vec<CallInfo>,
    /// Most recent persisted calls, newest first. Empty without a database.
    pub recent: Vec<CallRecord>,
}

/// GET /api/calls?limit=N
pub async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<CallsQuery>,
) -> Result<Json<CallsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 || limit > MAX_RECENT_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_RECENT_LIMIT
        )));
    }

    let recent = match &state.call_records {
        Some(repo) => repo.list_recent(limit)?,
        None => Vec::new(),
    };

    Ok(Json(CallsResponse {
        active: state.calls.active_calls(),
        recent,
    }))
}

/// GET /api/calls/{call_id}
pub async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<CallRecord>, ApiError> {
    let repo = state
        .call_records
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("call history is disabled".to_string()))?;
    repo.get_by_id(&CallId::from(call_id.as_str()))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("call {}", call_id)))
}

#[derive(Debug, Serialize)]
pub struct CallAgentResponse {
    #[serde(flatten)]
    pub info: ActiveAgentInfo,
    pub result: Option<AgentResult>,
}

/// GET /api/calls/{call_id}/agent
pub async fn call_agent(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<CallAgentResponse>, ApiError> {
    let call_id = CallId::from(call_id.as_str());
    let info = state
        .orchestrator
        .get_all_active_agents()
        .into_iter()
        .find(|info| info.call_id == call_id)
        .ok_or_else(|| ApiError::NotFound(format!("no agent for call {}", call_id)))?;
    let result = state
        .orchestrator
        .get_agent(&call_id)
        .and_then(|agent| agent.result());
    Ok(Json(CallAgentResponse { info, result }))
}
