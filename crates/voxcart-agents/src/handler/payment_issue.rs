//! Payment problem diagnosis and resolution.
//!
//! The transaction history is classified by ordered checks, then each
//! category has its own resolution:
//!
//! 1. any failed transaction: send a retry link
//! 2. order pending or only authorized: report the settlement wait
//! 3. more than one successful charge: refund the duplicate
//! 4. a pending refund: report the refund ETA
//! 5. otherwise nothing is wrong

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::{Order, RefundSpec, Transaction};
use crate::error::AgentError;
use crate::handler::refund::REFUND_ETA;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

const PENDING_WAIT: &str = "24-48 hours";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIssue {
    PaymentFailed,
    PaymentPending,
    DoubleCharge,
    RefundPending,
    None,
}

pub fn classify(order: &Order, transactions: &[Transaction]) -> PaymentIssue {
    if transactions.iter().any(Transaction::is_failed) {
        return PaymentIssue::PaymentFailed;
    }
    if matches!(order.financial_status.as_str(), "pending" | "authorized") {
        return PaymentIssue::PaymentPending;
    }
    let sales = transactions
        .iter()
        .filter(|t| t.kind == "sale" && t.status == "success")
        .count();
    if sales > 1 {
        return PaymentIssue::DoubleCharge;
    }
    if transactions
        .iter()
        .any(|t| t.kind == "refund" && t.status == "pending")
    {
        return PaymentIssue::RefundPending;
    }
    PaymentIssue::None
}

pub struct PaymentIssueAgent;

#[async_trait]
impl AgentHandler for PaymentIssueAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::PaymentIssue
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };
        let transactions = ctx.commerce().get_order_transactions(&order.id).await?;
        let issue = classify(&order, &transactions);

        tracing::info!(
            call_id = %ctx.call_id(),
            order_id = %order.id,
            issue = ?issue,
            "Payment issue classified"
        );

        let result = match issue {
            PaymentIssue::PaymentFailed => {
                let link = ctx.policy().payment_link(&order.id);
                AgentResult::success(
                    "Payment failed, retry link generated",
                    json!({ "issue": issue, "payment_link": link }),
                    format!(
                        "The payment for order {} failed. A new payment link has been sent: {}. Any amount debited for the failed attempt is reversed automatically by the bank.",
                        order.name, link
                    ),
                )
            }
            PaymentIssue::PaymentPending => AgentResult::success(
                "Payment pending confirmation",
                json!({ "issue": issue, "wait": PENDING_WAIT }),
                format!(
                    "The payment for order {} is still being confirmed by the bank. It usually settles within {}.",
                    order.name, PENDING_WAIT
                ),
            ),
            PaymentIssue::DoubleCharge => {
                let duplicate = transactions
                    .iter()
                    .filter(|t| t.kind == "sale" && t.status == "success")
                    .nth(1);
                let Some(duplicate) = duplicate else {
                    return Err(AgentError::InvalidData(
                        "double charge without a second sale".to_string(),
                    ));
                };
                let spec = RefundSpec {
                    order_id: order.id.clone(),
                    amount: duplicate.amount,
                    reason: "Duplicate charge".to_string(),
                    transaction_id: Some(duplicate.id.clone()),
                };
                let Some(refund) = ctx.commerce().create_refund(&spec).await? else {
                    return ctx
                        .reject(
                            action,
                            "Duplicate charge refund failed",
                            "The duplicate charge was found but the refund could not be created. Apologise and escalate to the payments team.",
                        )
                        .await;
                };
                AgentResult::success(
                    format!("Duplicate charge refunded ({})", refund.id),
                    json!({
                        "issue": issue,
                        "refund_id": refund.id,
                        "amount": refund.amount,
                        "eta": REFUND_ETA,
                    }),
                    format!(
                        "Order {} was charged twice. A refund of {} {:.2} for the duplicate charge has been initiated and will arrive in {}.",
                        order.name, order.currency, refund.amount, REFUND_ETA
                    ),
                )
            }
            PaymentIssue::RefundPending => AgentResult::success(
                "Refund in progress",
                json!({ "issue": issue, "eta": REFUND_ETA }),
                format!(
                    "A refund for order {} is already in progress and should reach the customer within {}.",
                    order.name, REFUND_ETA
                ),
            ),
            PaymentIssue::None => AgentResult::success(
                "No payment issue found",
                json!({ "issue": issue, "financial_status": order.financial_status }),
                format!(
                    "No problem was found with the payment for order {}; it is marked {}. Ask what exactly the customer is seeing.",
                    order.name, order.financial_status
                ),
            ),
        };
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

    fn tx(id: &str, kind: &str, status: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind: kind.to_string(),
            status: status.to_string(),
            amount: 1499.0,
            gateway: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_classification_order() {
        let paid = order("1");
        let mut pending = order("2");
        pending.financial_status = "pending".to_string();

        // Failure wins over everything else.
        assert_eq!(
            classify(&pending, &[tx("a", "sale", "failure"), tx("b", "sale", "success")]),
            PaymentIssue::PaymentFailed
        );
        assert_eq!(classify(&pending, &[]), PaymentIssue::PaymentPending);
        assert_eq!(
            classify(&paid, &[tx("a", "sale", "success"), tx("b", "sale", "success")]),
            PaymentIssue::DoubleCharge
        );
        assert_eq!(
            classify(&paid, &[tx("a", "sale", "success"), tx("r", "refund", "pending")]),
            PaymentIssue::RefundPending
        );
        assert_eq!(classify(&paid, &[tx("a", "sale", "success")]), PaymentIssue::None);
    }

    #[tokio::test]
    async fn test_failed_payment_gets_retry_link() {
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(order("5001"))
                .with_transactions("5001", vec![tx("a", "sale", "error")]),
        );
        let (ctx, _) = context(commerce, AgentType::PaymentIssue, &[("order_id", "5001")]);

        let result = completed(PaymentIssueAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["issue"], "payment_failed");
        assert!(result.data["payment_link"]
            .as_str()
            .unwrap()
            .ends_with("/orders/5001/pay"));
    }

    #[tokio::test]
    async fn test_double_charge_refunds_second_sale() {
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(order("5001"))
                .with_transactions(
                    "5001",
                    vec![tx("first", "sale", "success"), tx("second", "sale", "success")],
                ),
        );
        let (ctx, _) = context(commerce.clone(), AgentType::PaymentIssue, &[("order_id", "5001")]);

        let result = completed(PaymentIssueAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["issue"], "double_charge");
        let refunds = commerce.refunds();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].transaction_id.as_deref(), Some("second"));
        assert_eq!(refunds[0].reason, "Duplicate charge");
    }

    #[tokio::test]
    async fn test_no_issue() {
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(order("5001"))
                .with_transactions("5001", vec![tx("a", "capture", "success")]),
        );
        let (ctx, _) = context(commerce, AgentType::PaymentIssue, &[("order_id", "5001")]);

        let result = completed(PaymentIssueAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert_eq!(result.data["issue"], "none");
    }
}
