//! Order status lookup.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct OrderLookupAgent;

#[async_trait]
impl AgentHandler for OrderLookupAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::OrderLookup
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    fn confidence(&self) -> f32 {
        0.95
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        let status = order.status_label();
        let items: Vec<String> = order
            .line_items
            .iter()
            .map(|item| format!("{} x{}", item.title, item.quantity))
            .collect();

        let mut spoken = format!(
            "Order {} is {}. Items: {}. Total: {} {:.2}.",
            order.name,
            status,
            if items.is_empty() {
                "none listed".to_string()
            } else {
                items.join(", ")
            },
            order.currency,
            order.total_price
        );

        let mut tracking = serde_json::Value::Null;
        if let Some(number) = order.tracking_number.as_deref() {
            match ctx.commerce().get_tracking_info(number).await? {
                Some(info) => {
                    spoken.push_str(&format!(
                        " Shipped with {} (tracking {}), currently {}.",
                        info.carrier, info.tracking_number, info.status
                    ));
                    if let Some(eta) = info.estimated_delivery {
                        spoken.push_str(&format!(
                            " Expected delivery {}.",
                            eta.format("%d %B")
                        ));
                    }
                    tracking = serde_json::to_value(&info)?;
                }
                None => {
                    spoken.push_str(&format!(" Tracking number is {}.", number));
                    tracking = json!({ "tracking_number": number });
                }
            }
        }

        let result = AgentResult::success(
            format!("Order {} is {}", order.name, status),
            json!({
                "order_id": order.id,
                "order_name": order.name,
                "status": status,
                "financial_status": order.financial_status,
                "items": items,
                "total": order.total_price,
                "currency": order.currency,
                "tracking": tracking,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commerce::TrackingInfo;
    use crate::handler::testing::{completed, context, order, shipped};
    use crate::memory::InMemoryCommerce;
    use std::sync::Arc;
    use voxcart_core::types::ActionStatus;

    #[tokio::test]
    async fn test_lookup_missing_order() {
        let commerce = Arc::new(InMemoryCommerce::new());
        let (ctx, store) = context(commerce, AgentType::OrderLookup, &[("order_id", "9")]);

        let result = completed(OrderLookupAgent.execute(&ctx).await.unwrap());
        assert!(!result.success);
        assert_eq!(result.message, "Order not found");
        assert_eq!(store.records()[0].status, ActionStatus::Failed);
    }

    #[tokio::test]
    async fn test_lookup_processing_order() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, store) = context(commerce, AgentType::OrderLookup, &[("order_id", "5001")]);

        let result = completed(OrderLookupAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert_eq!(result.data["status"], "being processed");
        assert!(result.context_update.contains("Cotton Kurta x1"));
        assert!(result.data["tracking"].is_null());
        assert_eq!(store.records()[0].status, ActionStatus::Success);
    }

    #[tokio::test]
    async fn test_lookup_includes_tracking() {
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(shipped(order("5002"), "AWB123"))
                .with_tracking(TrackingInfo {
                    tracking_number: "AWB123".to_string(),
                    carrier: "Delhivery".to_string(),
                    status: "in transit".to_string(),
                    current_location: Some("Pune hub".to_string()),
                    estimated_delivery: None,
                }),
        );
        let (ctx, _) = context(commerce, AgentType::OrderLookup, &[("order_id", "5002")]);

        let result = completed(OrderLookupAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["status"], "shipped");
        assert_eq!(result.data["tracking"]["carrier"], "Delhivery");
        assert!(result.context_update.contains("in transit"));
    }

    #[tokio::test]
    async fn test_lookup_propagates_connector_failure() {
        let commerce = Arc::new(InMemoryCommerce::new());
        commerce.fail_with(crate::error::CommerceError::Request("down".to_string()));
        let (ctx, _) = context(commerce, AgentType::OrderLookup, &[("order_id", "1")]);

        let err = OrderLookupAgent.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::Commerce(_)));
    }
}
