//! Execution context handed to agent descriptors.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use voxcart_core::config::AgentsConfig;
use voxcart_core::types::{ActionId, ActionStatus, CallId, NewAction};

use crate::commerce::CommerceConnector;
use crate::error::AgentError;
use crate::store::ActionStore;
use crate::types::{AgentOutcome, AgentResult, AgentType, FieldMap};

/// Eligibility windows and links shared by all agents.
#[derive(Debug, Clone)]
pub struct AgentPolicy {
    pub return_window: ChronoDuration,
    pub exchange_window: ChronoDuration,
    pub address_change_window: ChronoDuration,
    pub payment_link_base: String,
}

impl AgentPolicy {
    pub fn from_config(config: &AgentsConfig) -> Self {
        Self {
            return_window: ChronoDuration::days(config.return_window_days),
            exchange_window: ChronoDuration::days(config.exchange_window_days),
            address_change_window: ChronoDuration::hours(config.address_change_window_hours),
            payment_link_base: config.payment_link_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn payment_link(&self, order_id: &str) -> String {
        format!("{}/orders/{}/pay", self.payment_link_base, order_id)
    }
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self::from_config(&AgentsConfig::default())
    }
}

/// Collaborators every agent shares.
#[derive(Clone)]
pub struct AgentDeps {
    pub commerce: Arc<dyn CommerceConnector>,
    pub store: Arc<dyn ActionStore>,
    pub policy: Arc<AgentPolicy>,
}

/// Snapshot of an agent's data plus access to its collaborators for the
/// duration of one `execute` call.
pub struct AgentContext {
    call_id: CallId,
    agent_type: AgentType,
    confidence: f32,
    data: FieldMap,
    deps: AgentDeps,
    open_action: Mutex<Option<ActionId>>,
}

impl AgentContext {
    pub fn new(
        call_id: CallId,
        agent_type: AgentType,
        confidence: f32,
        data: FieldMap,
        deps: AgentDeps,
    ) -> Self {
        Self {
            call_id,
            agent_type,
            confidence,
            data,
            deps,
            open_action: Mutex::new(None),
        }
    }

    fn set_open_action(&self, action: Option<ActionId>) {
        if let Ok(mut open) = self.open_action.lock() {
            *open = action;
        }
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn data(&self) -> &FieldMap {
        &self.data
    }

    /// Trimmed field value, `None` when absent or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A field the engine guaranteed before calling `execute`.
    pub fn require(&self, name: &str) -> Result<&str, AgentError> {
        self.field(name)
            .ok_or_else(|| AgentError::InvalidData(format!("missing field {}", name)))
    }

    pub fn commerce(&self) -> &dyn CommerceConnector {
        self.deps.commerce.as_ref()
    }

    pub fn policy(&self) -> &AgentPolicy {
        &self.deps.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Open a pending audit row capturing the collected inputs.
    pub async fn record_action(&self) -> Result<ActionId, AgentError> {
        let input = serde_json::to_value(&self.data)?;
        let id = self
            .deps
            .store
            .create(NewAction {
                call_id: self.call_id.clone(),
                action_type: self.agent_type.name().to_string(),
                input,
                confidence: self.confidence,
            })
            .await?;
        self.set_open_action(Some(id));
        Ok(id)
    }

    /// Set the status of an audit row.
    pub async fn mark_action(
        &self,
        action: ActionId,
        status: ActionStatus,
        detail: Option<String>,
    ) -> Result<(), AgentError> {
        self.deps.store.update_status(action, status, detail).await?;
        if status != ActionStatus::Pending {
            self.set_open_action(None);
        }
        Ok(())
    }

    /// Mark the still-open audit row failed after `execute` returned an error.
    pub(crate) async fn abandon_action(&self, error: &AgentError) {
        let open = self.open_action.lock().ok().and_then(|mut open| open.take());
        let Some(action) = open else {
            return;
        };
        if let Err(e) = self
            .deps
            .store
            .update_status(action, ActionStatus::Failed, Some(error.to_string()))
            .await
        {
            tracing::warn!(call_id = %self.call_id, error = %e, "Failed to close audit action");
        }
    }

    /// Close the audit row as successful and complete with `result`.
    pub async fn succeed(
        &self,
        action: ActionId,
        result: AgentResult,
    ) -> Result<AgentOutcome, AgentError> {
        self.mark_action(action, ActionStatus::Success, Some(result.message.clone()))
            .await?;
        Ok(AgentOutcome::Completed(result))
    }

    /// Close the audit row as failed and complete with `success: false`.
    ///
    /// Used for business-rule rejections and not-found lookups.
    pub async fn reject(
        &self,
        action: ActionId,
        reason: &str,
        context_update: impl Into<String>,
    ) -> Result<AgentOutcome, AgentError> {
        self.mark_action(action, ActionStatus::Failed, Some(reason.to_string()))
            .await?;
        tracing::info!(
            call_id = %self.call_id,
            agent_type = %self.agent_type,
            reason = %reason,
            "Agent request rejected"
        );
        Ok(AgentOutcome::Completed(AgentResult::failure(
            reason,
            context_update,
        )))
    }
}
