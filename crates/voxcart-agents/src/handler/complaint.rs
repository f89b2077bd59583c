//! Complaint intake and ticketing.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::AgentHandler;
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct ComplaintAgent;

/// Keyword table, checked in order.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("damaged_product", &["damaged", "broken", "toota", "tuta", "phata", "defective", "crack"]),
    ("wrong_item", &["wrong item", "wrong product", "galat", "different product", "not what i ordered"]),
    ("delivery_delay", &["late", "delay", "not delivered", "nahi aaya", "abhi tak", "still waiting"]),
    ("quality_issue", &["quality", "cheap", "fake", "duplicate", "kharab"]),
    ("service", &["rude", "behaviour", "behavior", "staff", "support", "customer care", "delivery boy"]),
];

const HIGH_PRIORITY_CUES: &[&str] = &[
    "damaged", "broken", "fraud", "scam", "urgent", "jaldi", "immediately", "police", "legal",
];

pub(crate) fn categorize(details: &str) -> &'static str {
    let text = details.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or("other")
}

pub(crate) fn priority(details: &str) -> &'static str {
    let text = details.to_lowercase();
    if HIGH_PRIORITY_CUES.iter().any(|cue| text.contains(cue)) {
        "high"
    } else {
        "normal"
    }
}

/// Eight uppercase hex characters after `prefix`.
pub(crate) fn ticket_id(prefix: &str) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, raw[..8].to_uppercase())
}

#[async_trait]
impl AgentHandler for ComplaintAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Complaint
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["complaint_details"]
    }

    fn confidence(&self) -> f32 {
        0.85
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let details = ctx.require("complaint_details")?;
        let action = ctx.record_action().await?;

        let order = match ctx.field("order_id") {
            Some(order_id) => ctx.commerce().get_order(order_id).await?,
            None => None,
        };

        let category = categorize(details);
        let priority = priority(details);
        let sla_hours = if priority == "high" { 24 } else { 48 };
        let ticket = ticket_id("CMP");

        tracing::info!(
            call_id = %ctx.call_id(),
            ticket = %ticket,
            category = %category,
            priority = %priority,
            "Complaint registered"
        );

        let mut spoken = format!(
            "Complaint {} has been registered as {} priority.",
            ticket, priority
        );
        if let Some(order) = &order {
            spoken.push_str(&format!(" It is linked to order {}.", order.name));
        }
        spoken.push_str(&format!(
            " Our team will get back to the customer within {} hours.",
            sla_hours
        ));

        let result = AgentResult::success(
            format!("Complaint {} registered", ticket),
            json!({
                "ticket_id": ticket,
                "category": category,
                "priority": priority,
                "sla_hours": sla_hours,
                "order_id": order.as_ref().map(|o| o.id.clone()),
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{completed, context, order};
    use crate::memory::InMemoryCommerce;
    use std::sync::Arc;

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("The box arrived broken"), "damaged_product");
        assert_eq!(categorize("mujhe galat saman mila"), "wrong_item");
        assert_eq!(categorize("order abhi tak nahi aaya"), "delivery_delay");
        assert_eq!(categorize("the delivery boy was rude"), "service");
        assert_eq!(categorize("I just don't like it"), "other");
    }

    #[test]
    fn test_priority() {
        assert_eq!(priority("this is a fraud"), "high");
        assert_eq!(priority("please fix it jaldi"), "high");
        assert_eq!(priority("colour is off"), "normal");
    }

    #[test]
    fn test_ticket_id_format() {
        let id = ticket_id("CMP");
        assert_eq!(id.len(), 12);
        assert!(id.starts_with("CMP-"));
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn test_complaint_with_order() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, _) = context(
            commerce,
            AgentType::Complaint,
            &[("complaint_details", "product arrived damaged"), ("order_id", "5001")],
        );

        let result = completed(ComplaintAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert_eq!(result.data["category"], "damaged_product");
        assert_eq!(result.data["priority"], "high");
        assert_eq!(result.data["sla_hours"], 24);
        assert_eq!(result.data["order_id"], "5001");
    }

    #[tokio::test]
    async fn test_complaint_without_order() {
        let commerce = Arc::new(InMemoryCommerce::new());
        let (ctx, _) = context(
            commerce.clone(),
            AgentType::Complaint,
            &[("complaint_details", "nobody answers my emails")],
        );

        let result = completed(ComplaintAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["sla_hours"], 48);
        assert!(result.data["order_id"].is_null());
        assert!(commerce.calls().is_empty());
    }
}
