//! Invoice generation and delivery.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct InvoiceAgent;

#[async_trait]
impl AgentHandler for InvoiceAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Invoice
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
        if order.is_cancelled() {
            return ctx
                .reject(
                    action,
                    "Order is cancelled",
                    format!("Order {} was cancelled, so no invoice is issued for it.", order.name),
                )
                .await;
        }

        let Some(invoice) = ctx.commerce().generate_invoice(&order.id).await? else {
            return ctx
                .reject(
                    action,
                    "Invoice could not be generated",
                    "The invoice could not be generated right now. Offer to email it later.",
                )
                .await;
        };

        let email = ctx
            .field("email")
            .map(str::to_string)
            .or_else(|| order.email.clone());
        let sent = match email.as_deref() {
            Some(address) => ctx.commerce().send_invoice(&invoice, address).await?,
            None => false,
        };

        let spoken = match (&email, sent) {
            (Some(address), true) => format!(
                "Invoice {} for order {} has been emailed to {}.",
                invoice.invoice_number, order.name, address
            ),
            (Some(_), false) => format!(
                "Invoice {} for order {} is ready, but the email could not be sent. It can be downloaded from the order page.",
                invoice.invoice_number, order.name
            ),
            (None, _) => format!(
                "Invoice {} for order {} is ready. Ask for an email address to send it to.",
                invoice.invoice_number, order.name
            ),
        };

        let emailed_to = if sent { email.clone() } else { None };
        let result = AgentResult::success(
            format!("Invoice {} generated", invoice.invoice_number),
            json!({
                "invoice_number": invoice.invoice_number,
                "amount": invoice.amount,
                "url": invoice.url,
                "emailed_to": emailed_to,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}
