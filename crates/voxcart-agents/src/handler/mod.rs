//! Agent descriptors and the registry that maps agent types to them.
//!
//! Each descriptor declares the fields it needs, how to ask for them, and
//! the business workflow it runs once they are present. The generic
//! [`Agent`](crate::agent::Agent) engine drives the lifecycle around it.

pub mod address_change;
pub mod cancel_order;
pub mod cod;
pub mod complaint;
pub mod exchange;
pub mod invoice;
pub mod order_lookup;
pub mod payment_issue;
pub mod product_inquiry;
pub mod refund;
pub mod registration;
pub mod return_request;
pub mod technical_support;
pub mod tracking;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use voxcart_core::types::ActionId;

use crate::agent::AgentContext;
use crate::commerce::Order;
use crate::error::AgentError;
use crate::types::{AgentOutcome, AgentType};

pub use address_change::AddressChangeAgent;
pub use cancel_order::CancelOrderAgent;
pub use cod::CodAgent;
pub use complaint::ComplaintAgent;
pub use exchange::ExchangeAgent;
pub use invoice::InvoiceAgent;
pub use order_lookup::OrderLookupAgent;
pub use payment_issue::PaymentIssueAgent;
pub use product_inquiry::ProductInquiryAgent;
pub use refund::RefundAgent;
pub use registration::RegistrationAgent;
pub use return_request::ReturnAgent;
pub use technical_support::TechnicalSupportAgent;
pub use tracking::TrackingAgent;

pub(crate) const ORDER_NOT_FOUND: &str = "Order not found";

/// Per-type agent descriptor.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Fields that must be non-empty before `execute` runs, in asking order.
    fn required_fields(&self) -> &'static [&'static str];

    /// Question put to the caller when `field` is missing.
    fn prompt_for_field(&self, field: &str) -> Option<&'static str> {
        common_prompt(field)
    }

    /// Confidence recorded on the audit row.
    fn confidence(&self) -> f32 {
        0.9
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError>;
}

/// Prompts shared by every agent that needs the field.
pub fn common_prompt(field: &str) -> Option<&'static str> {
    match field {
        "order_id" => Some("Could you please tell me your order number?"),
        "phone" => Some("Could you please share your 10-digit mobile number?"),
        "email" => Some("What email address should we use?"),
        "new_address" => {
            Some("Please tell me the complete new address, including the 6-digit PIN code.")
        }
        "reason" => Some("Could you tell me the reason?"),
        "complaint_details" => Some("Please describe the problem you faced."),
        "issue_description" => Some("What technical issue are you facing?"),
        _ => None,
    }
}

/// Registry of agent descriptors keyed by type.
#[derive(Default)]
pub struct AgentRegistry {
    handlers: HashMap<AgentType, Arc<dyn AgentHandler>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all fourteen built-in agents.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Register a descriptor, replacing any previous one for its type.
    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) {
        let agent_type = handler.agent_type();
        tracing::debug!(agent_type = %agent_type, "Registered agent");
        self.handlers.insert(agent_type, handler);
    }

    pub fn register_defaults(&mut self) {
        self.register(Arc::new(OrderLookupAgent));
        self.register(Arc::new(ReturnAgent));
        self.register(Arc::new(RefundAgent));
        self.register(Arc::new(CancelOrderAgent));
        self.register(Arc::new(TrackingAgent));
        self.register(Arc::new(ComplaintAgent));
        self.register(Arc::new(ProductInquiryAgent));
        self.register(Arc::new(PaymentIssueAgent));
        self.register(Arc::new(AddressChangeAgent));
        self.register(Arc::new(ExchangeAgent));
        self.register(Arc::new(CodAgent));
        self.register(Arc::new(InvoiceAgent));
        self.register(Arc::new(RegistrationAgent));
        self.register(Arc::new(TechnicalSupportAgent));
    }

    pub fn get(&self, agent_type: AgentType) -> Option<Arc<dyn AgentHandler>> {
        self.handlers.get(&agent_type).cloned()
    }

    pub fn is_registered(&self, agent_type: AgentType) -> bool {
        self.handlers.contains_key(&agent_type)
    }

    pub fn registered_types(&self) -> Vec<AgentType> {
        let mut types: Vec<AgentType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// =============================================================================
// Shared workflow steps
// =============================================================================

pub(crate) async fn order_not_found(
    ctx: &AgentContext,
    action: ActionId,
    order_id: &str,
) -> Result<AgentOutcome, AgentError> {
    ctx.reject(
        action,
        ORDER_NOT_FOUND,
        format!(
            "No order was found with number {}. Ask the customer to check the order number and repeat it.",
            order_id
        ),
    )
    .await
}

/// Why a delivered-order request (return, exchange) is not allowed.
pub(crate) fn delivery_window_rejection(
    order: &Order,
    window: ChronoDuration,
    now: DateTime<Utc>,
    label: &str,
) -> Option<String> {
    if order.is_cancelled() {
        return Some("Order is cancelled".to_string());
    }
    let Some(delivered_at) = order.delivered_at() else {
        return Some("Order has not been delivered yet".to_string());
    };
    if now - delivered_at > window {
        return Some(format!(
            "{} window expired ({} days from delivery)",
            label,
            window.num_days()
        ));
    }
    None
}
