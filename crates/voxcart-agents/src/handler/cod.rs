//! Cash-on-delivery questions and prepaid conversion.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct CodAgent;

#[async_trait]
impl AgentHandler for CodAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Cod
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let convert = ctx.field("action") == Some("convert_to_prepaid");
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        if order.is_cancelled() {
            return ctx
                .reject(
                    action,
                    "Order is cancelled",
                    format!("Order {} is cancelled, so nothing is payable.", order.name),
                )
                .await;
        }

        if !order.is_cod() {
            let result = AgentResult::success(
                "Order is prepaid",
                json!({ "order_id": order.id, "cod": false, "amount_due": 0.0 }),
                format!(
                    "Order {} is already paid online, so nothing needs to be paid on delivery.",
                    order.name
                ),
            );
            return ctx.succeed(action, result).await;
        }

        let result = if convert {
            let link = ctx.policy().payment_link(&order.id);
            AgentResult::success(
                "Prepaid payment link generated",
                json!({
                    "order_id": order.id,
                    "cod": true,
                    "amount_due": order.total_price,
                    "payment_link": link,
                }),
                format!(
                    "To pay online for order {} instead of cash on delivery, the customer can use this link: {}. The amount is {} {:.2}.",
                    order.name, link, order.currency, order.total_price
                ),
            )
        } else {
            AgentResult::success(
                "Cash on delivery amount reported",
                json!({
                    "order_id": order.id,
                    "cod": true,
                    "amount_due": order.total_price,
                }),
                format!(
                    "Order {} is cash on delivery. Please keep {} {:.2} ready at delivery; UPI is also accepted by the courier.",
                    order.name, order.currency, order.total_price
                ),
            )
        };
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{completed, context, order};
    use crate::memory::InMemoryCommerce;
    use std::sync::Arc;

    fn cod_order(id: &str) -> crate::commerce::Order {
        let mut o = order(id);
        o.payment_gateway = Some("Cash on Delivery (COD)".to_string());
        o.financial_status = "pending".to_string();
        o
    }

    #[tokio::test]
    async fn test_prepaid_order_owes_nothing() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, _) = context(commerce, AgentType::Cod, &[("order_id", "5001")]);

        let result = completed(CodAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["cod"], false);
        assert_eq!(result.data["amount_due"], 0.0);
    }

    #[tokio::test]
    async fn test_cod_amount_due() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(cod_order("5001")));
        let (ctx, _) = context(commerce, AgentType::Cod, &[("order_id", "5001")]);

        let result = completed(CodAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["amount_due"], 1499.0);
        assert!(result.data.get("payment_link").is_none());
    }

    #[tokio::test]
    async fn test_convert_to_prepaid_returns_link() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(cod_order("5001")));
        let (ctx, _) = context(
            commerce,
            AgentType::Cod,
            &[("order_id", "5001"), ("action", "convert_to_prepaid")],
        );

        let result = completed(CodAgent.execute(&ctx).await.unwrap());
        assert!(result.data["payment_link"]
            .as_str()
            .unwrap()
            .ends_with("/orders/5001/pay"));
    }
}
