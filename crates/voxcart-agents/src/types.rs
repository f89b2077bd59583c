//! Core types and value objects for the agent engine.
//!
//! Defines agent types and states, agent results and lifecycle events,
//! and the intent labels produced by the detector.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use voxcart_core::types::CallId;

/// Collected agent fields and extracted entities, keyed by field name.
pub type FieldMap = BTreeMap<String, String>;

// =============================================================================
// Agents
// =============================================================================

/// The fourteen task agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentType {
    #[serde(rename = "OrderLookupAgent")]
    OrderLookup,
    #[serde(rename = "ReturnAgent")]
    Return,
    #[serde(rename = "RefundAgent")]
    Refund,
    #[serde(rename = "CancelOrderAgent")]
    CancelOrder,
    #[serde(rename = "TrackingAgent")]
    Tracking,
    #[serde(rename = "ComplaintAgent")]
    Complaint,
    #[serde(rename = "ProductInquiryAgent")]
    ProductInquiry,
    #[serde(rename = "PaymentIssueAgent")]
    PaymentIssue,
    #[serde(rename = "AddressChangeAgent")]
    AddressChange,
    #[serde(rename = "ExchangeAgent")]
    Exchange,
    #[serde(rename = "CODAgent")]
    Cod,
    #[serde(rename = "InvoiceAgent")]
    Invoice,
    #[serde(rename = "RegistrationAgent")]
    Registration,
    #[serde(rename = "TechnicalSupportAgent")]
    TechnicalSupport,
}

impl AgentType {
    pub const ALL: [AgentType; 14] = [
        AgentType::OrderLookup,
        AgentType::Return,
        AgentType::Refund,
        AgentType::CancelOrder,
        AgentType::Tracking,
        AgentType::Complaint,
        AgentType::ProductInquiry,
        AgentType::PaymentIssue,
        AgentType::AddressChange,
        AgentType::Exchange,
        AgentType::Cod,
        AgentType::Invoice,
        AgentType::Registration,
        AgentType::TechnicalSupport,
    ];

    /// Registry name used in events, audit rows and the API.
    pub fn name(&self) -> &'static str {
        match self {
            AgentType::OrderLookup => "OrderLookupAgent",
            AgentType::Return => "ReturnAgent",
            AgentType::Refund => "RefundAgent",
            AgentType::CancelOrder => "CancelOrderAgent",
            AgentType::Tracking => "TrackingAgent",
            AgentType::Complaint => "ComplaintAgent",
            AgentType::ProductInquiry => "ProductInquiryAgent",
            AgentType::PaymentIssue => "PaymentIssueAgent",
            AgentType::AddressChange => "AddressChangeAgent",
            AgentType::Exchange => "ExchangeAgent",
            AgentType::Cod => "CODAgent",
            AgentType::Invoice => "InvoiceAgent",
            AgentType::Registration => "RegistrationAgent",
            AgentType::TechnicalSupport => "TechnicalSupportAgent",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("Unknown agent type: {}", s))
    }
}

/// Agent lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Initializing,
    WaitingForInfo,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl AgentState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Completed | AgentState::Cancelled | AgentState::Error
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Initializing => write!(f, "INITIALIZING"),
            AgentState::WaitingForInfo => write!(f, "WAITING_FOR_INFO"),
            AgentState::Running => write!(f, "RUNNING"),
            AgentState::Completed => write!(f, "COMPLETED"),
            AgentState::Cancelled => write!(f, "CANCELLED"),
            AgentState::Error => write!(f, "ERROR"),
        }
    }
}

/// Final outcome of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    /// Short machine-facing summary ("Order not found", "Refund created").
    pub message: String,
    /// Structured domain result.
    pub data: serde_json::Value,
    /// Natural-language grounding injected into the live conversation.
    pub context_update: String,
}

impl AgentResult {
    pub fn success(
        message: impl Into<String>,
        data: serde_json::Value,
        context_update: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            context_update: context_update.into(),
        }
    }

    pub fn failure(message: impl Into<String>, context_update: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: serde_json::Value::Null,
            context_update: context_update.into(),
        }
    }
}

/// What a descriptor's `execute` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Completed(AgentResult),
    /// Execution discovered it needs another field from the caller.
    NeedInfo { field: String, prompt: String },
}

/// Events an agent pushes to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    NeedInfo { field: String, prompt: String },
    Completed(AgentResult),
    Failed(String),
}

/// Lifecycle events published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    AgentNeedsInfo {
        call_id: CallId,
        agent_type: AgentType,
        field: String,
        prompt: String,
    },
    AgentCompleted {
        call_id: CallId,
        agent_type: AgentType,
        result: AgentResult,
        duration_ms: u64,
    },
    AgentError {
        call_id: CallId,
        agent_type: AgentType,
        error: String,
    },
    AgentCancelled {
        call_id: CallId,
        agent_type: AgentType,
    },
}

impl OrchestratorEvent {
    pub fn call_id(&self) -> &CallId {
        match self {
            OrchestratorEvent::AgentNeedsInfo { call_id, .. }
            | OrchestratorEvent::AgentCompleted { call_id, .. }
            | OrchestratorEvent::AgentError { call_id, .. }
            | OrchestratorEvent::AgentCancelled { call_id, .. } => call_id,
        }
    }

    pub fn agent_type(&self) -> AgentType {
        match self {
            OrchestratorEvent::AgentNeedsInfo { agent_type, .. }
            | OrchestratorEvent::AgentCompleted { agent_type, .. }
            | OrchestratorEvent::AgentError { agent_type, .. }
            | OrchestratorEvent::AgentCancelled { agent_type, .. } => *agent_type,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            OrchestratorEvent::AgentNeedsInfo { .. } => "agent_needs_info",
            OrchestratorEvent::AgentCompleted { .. } => "agent_completed",
            OrchestratorEvent::AgentError { .. } => "agent_error",
            OrchestratorEvent::AgentCancelled { .. } => "agent_cancelled",
        }
    }
}

/// Counts across the orchestrator's active set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_state: BTreeMap<String, usize>,
}

// =============================================================================
// Intents
// =============================================================================

/// Intent labels produced by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    OrderLookup,
    Return,
    Refund,
    CancelOrder,
    Tracking,
    Complaint,
    ProductInquiry,
    PaymentIssue,
    AddressChange,
    Exchange,
    Cod,
    Invoice,
    Registration,
    TechnicalSupport,
    Greeting,
    CancelAction,
    Chat,
}

impl Intent {
    /// The agent a business intent dispatches to; `None` for the
    /// conversational intents.
    pub fn agent_type(&self) -> Option<AgentType> {
        match self {
            Intent::OrderLookup => Some(AgentType::OrderLookup),
            Intent::Return => Some(AgentType::Return),
            Intent::Refund => Some(AgentType::Refund),
            Intent::CancelOrder => Some(AgentType::CancelOrder),
            Intent::Tracking => Some(AgentType::Tracking),
            Intent::Complaint => Some(AgentType::Complaint),
            Intent::ProductInquiry => Some(AgentType::ProductInquiry),
            Intent::PaymentIssue => Some(AgentType::PaymentIssue),
            Intent::AddressChange => Some(AgentType::AddressChange),
            Intent::Exchange => Some(AgentType::Exchange),
            Intent::Cod => Some(AgentType::Cod),
            Intent::Invoice => Some(AgentType::Invoice),
            Intent::Registration => Some(AgentType::Registration),
            Intent::TechnicalSupport => Some(AgentType::TechnicalSupport),
            Intent::Greeting | Intent::CancelAction | Intent::Chat => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Intent::OrderLookup => "ORDER_LOOKUP",
            Intent::Return => "RETURN",
            Intent::Refund => "REFUND",
            Intent::CancelOrder => "CANCEL_ORDER",
            Intent::Tracking => "TRACKING",
            Intent::Complaint => "COMPLAINT",
            Intent::ProductInquiry => "PRODUCT_INQUIRY",
            Intent::PaymentIssue => "PAYMENT_ISSUE",
            Intent::AddressChange => "ADDRESS_CHANGE",
            Intent::Exchange => "EXCHANGE",
            Intent::Cod => "COD",
            Intent::Invoice => "INVOICE",
            Intent::Registration => "REGISTRATION",
            Intent::TechnicalSupport => "TECHNICAL_SUPPORT",
            Intent::Greeting => "GREETING",
            Intent::CancelAction => "CANCEL_ACTION",
            Intent::Chat => "CHAT",
        };
        f.write_str(label)
    }
}

/// Classification of one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: FieldMap,
    pub requires_agent: bool,
    pub agent_type: Option<AgentType>,
    pub should_cancel_agent: bool,
}
