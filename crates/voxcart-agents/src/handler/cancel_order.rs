//! Order cancellation before shipment.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::CancelSpec;
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct CancelOrderAgent;

#[async_trait]
impl AgentHandler for CancelOrderAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::CancelOrder
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    fn prompt_for_field(&self, field: &str) -> Option<&'static str> {
        match field {
            "order_id" => Some("Which order would you like to cancel? Please tell me the order number."),
            other => super::common_prompt(other),
        }
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let reason = ctx.field("reason").unwrap_or("Customer requested cancellation");
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        if order.is_cancelled() {
            return ctx
                .reject(
                    action,
                    "Order is already cancelled",
                    format!("Order {} was already cancelled earlier.", order.name),
                )
                .await;
        }
        if order.has_shipped() {
            return ctx
                .reject(
                    action,
                    "Order has already shipped",
                    format!(
                        "Order {} has already shipped and can no longer be cancelled. The customer can refuse delivery or request a return after it arrives.",
                        order.name
                    ),
                )
                .await;
        }

        let paid = matches!(
            order.financial_status.as_str(),
            "paid" | "partially_paid" | "partially_refunded"
        );
        let spec = CancelSpec {
            order_id: order.id.clone(),
            reason: reason.to_string(),
            refund: paid,
            restock: true,
        };
        let Some(record) = ctx.commerce().cancel_order(&spec).await? else {
            return ctx
                .reject(
                    action,
                    "Cancellation failed",
                    "The cancellation could not be completed right now. Apologise and offer to escalate.",
                )
                .await;
        };

        let mut spoken = format!("Order {} has been cancelled.", order.name);
        if let Some(amount) = record.refund_amount {
            spoken.push_str(&format!(
                " A refund of {} {:.2} will reach the original payment method in {}.",
                order.currency,
                amount,
                super::refund::REFUND_ETA
            ));
        }

        let result = AgentResult::success(
            format!("Order {} cancelled", order.name),
            json!({
                "order_id": record.order_id,
                "cancelled_at": record.cancelled_at,
                "refund_amount": record.refund_amount,
                "reason": reason,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{cancelled, completed, context, order, shipped};
    use crate::memory::InMemoryCommerce;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancel_paid_order_refunds() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, _) = context(commerce.clone(), AgentType::CancelOrder, &[("order_id", "5001")]);

        let result = completed(CancelOrderAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert_eq!(result.data["refund_amount"], 1499.0);
        assert!(commerce.order("5001").unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_pending_payment_has_no_refund() {
        let mut unpaid = order("5001");
        unpaid.financial_status = "pending".to_string();
        let commerce = Arc::new(InMemoryCommerce::new().with_order(unpaid));
        let (ctx, _) = context(commerce, AgentType::CancelOrder, &[("order_id", "5001")]);

        let result = completed(CancelOrderAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert!(result.data["refund_amount"].is_null());
    }

    #[tokio::test]
    async fn test_cancel_blocked_once_shipped() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(shipped(order("5001"), "AWB1")));
        let (ctx, _) = context(commerce.clone(), AgentType::CancelOrder, &[("order_id", "5001")]);

        let result = completed(CancelOrderAgent.execute(&ctx).await.unwrap());
        assert!(!result.success);
        assert_eq!(result.message, "Order has already shipped");
        assert!(!commerce.order("5001").unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_already_cancelled() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(cancelled(order("5001"))));
        let (ctx, _) = context(commerce, AgentType::CancelOrder, &[("order_id", "5001")]);

        let result = completed(CancelOrderAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.message, "Order is already cancelled");
    }

    #[test]
    fn test_cancel_prompt_override() {
        let prompt = CancelOrderAgent.prompt_for_field("order_id").unwrap();
        assert!(prompt.starts_with("Which order would you like to cancel"));
        assert!(CancelOrderAgent.prompt_for_field("reason").is_some());
    }
}
