//! Refund requests.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::{RefundSpec, Transaction};
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub(crate) const REFUND_ETA: &str = "5-7 business days";

pub struct RefundAgent;

/// Captured total minus everything already refunded successfully.
pub(crate) fn refundable_amount(transactions: &[Transaction]) -> f64 {
    let captured: f64 = transactions
        .iter()
        .filter(|t| t.is_successful_charge())
        .map(|t| t.amount)
        .sum();
    let refunded: f64 = transactions
        .iter()
        .filter(|t| t.kind == "refund" && t.status == "success")
        .map(|t| t.amount)
        .sum();
    (captured - refunded).max(0.0)
}

/// Parse a spoken amount like "1,499" or "1499.50".
fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").trim().parse::<f64>().ok().filter(|a| *a > 0.0)
}

#[async_trait]
impl AgentHandler for RefundAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Refund
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let reason = ctx.field("reason").unwrap_or("Customer requested refund");
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        if order.financial_status == "refunded" {
            return ctx
                .reject(
                    action,
                    "Order already refunded",
                    format!("Order {} has already been fully refunded.", order.name),
                )
                .await;
        }

        let transactions = ctx.commerce().get_order_transactions(&order.id).await?;
        let Some(charge) = transactions.iter().find(|t| t.is_successful_charge()) else {
            return ctx
                .reject(
                    action,
                    "No payment found for order",
                    format!(
                        "No completed payment was found for order {}, so there is nothing to refund.",
                        order.name
                    ),
                )
                .await;
        };

        let available = refundable_amount(&transactions);
        let requested = ctx.field("amount").and_then(parse_amount);
        let amount = match requested {
            Some(a) if a <= available => a,
            _ => available,
        };
        if amount <= 0.0 {
            return ctx
                .reject(
                    action,
                    "Order already refunded",
                    format!("Order {} has already been fully refunded.", order.name),
                )
                .await;
        }

        let spec = RefundSpec {
            order_id: order.id.clone(),
            amount,
            reason: reason.to_string(),
            transaction_id: Some(charge.id.clone()),
        };
        let Some(record) = ctx.commerce().create_refund(&spec).await? else {
            return ctx
                .reject(
                    action,
                    "Refund could not be created",
                    "The refund could not be created right now. Apologise and offer to escalate.",
                )
                .await;
        };

        let result = AgentResult::success(
            format!("Refund {} created", record.id),
            json!({
                "refund_id": record.id,
                "amount": record.amount,
                "currency": order.currency,
                "status": record.status,
                "eta": REFUND_ETA,
            }),
            format!(
                "A refund of {} {:.2} for order {} has been initiated. It will reach the original payment method in {}.",
                order.currency, record.amount, order.name, REFUND_ETA
            ),
        );
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{completed, context, order};
    use crate::memory::InMemoryCommerce;
    use chrono::Utc;
    use std::sync::Arc;

    fn tx(id: &str, kind: &str, status: &str, amount: f64) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind: kind.to_string(),
            status: status.to_string(),
            amount,
            gateway: Some("razorpay".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_refundable_amount() {
        let txs = vec![
            tx("t1", "sale", "success", 1499.0),
            tx("t2", "refund", "success", 500.0),
            tx("t3", "refund", "pending", 100.0),
        ];
        assert_eq!(refundable_amount(&txs), 999.0);
        assert_eq!(refundable_amount(&[]), 0.0);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,499"), Some(1499.0));
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("lots"), None);
    }

    #[tokio::test]
    async fn test_refund_defaults_to_remaining_amount() {
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(order("5001"))
                .with_transactions(
                    "5001",
                    vec![
                        tx("t1", "sale", "success", 1499.0),
                        tx("t2", "refund", "success", 499.0),
                    ],
                ),
        );
        let (ctx, _) = context(commerce.clone(), AgentType::Refund, &[("order_id", "5001")]);

        let result = completed(RefundAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert_eq!(result.data["amount"], 1000.0);
        assert_eq!(result.data["eta"], REFUND_ETA);
        assert_eq!(commerce.refunds()[0].transaction_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_refund_requested_amount_capped() {
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(order("5001"))
                .with_transactions("5001", vec![tx("t1", "capture", "success", 1499.0)]),
        );
        let (ctx, _) = context(
            commerce.clone(),
            AgentType::Refund,
            &[("order_id", "5001"), ("amount", "500")],
        );
        let result = completed(RefundAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["amount"], 500.0);

        let (ctx, _) = context(
            commerce.clone(),
            AgentType::Refund,
            &[("order_id", "5001"), ("amount", "99999")],
        );
        let result = completed(RefundAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["amount"], 1499.0);
    }

    #[tokio::test]
    async fn test_refund_rejects_unpaid_and_refunded() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, _) = context(commerce, AgentType::Refund, &[("order_id", "5001")]);
        let result = completed(RefundAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.message, "No payment found for order");

        let mut refunded = order("5002");
        refunded.financial_status = "refunded".to_string();
        let commerce = Arc::new(InMemoryCommerce::new().with_order(refunded));
        let (ctx, _) = context(commerce.clone(), AgentType::Refund, &[("order_id", "5002")]);
        let result = completed(RefundAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.message, "Order already refunded");
        assert!(commerce.refunds().is_empty());
    }
}
