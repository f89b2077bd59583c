//! Return requests for delivered orders.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::{PickupRequest, ReturnSpec};
use crate::error::AgentError;
use crate::handler::{delivery_window_rejection, order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct ReturnAgent;

#[async_trait]
impl AgentHandler for ReturnAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Return
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let reason = ctx.field("reason").unwrap_or("Customer requested return");
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        let now = ctx.now();
        if let Some(rejection) =
            delivery_window_rejection(&order, ctx.policy().return_window, now, "Return")
        {
            let spoken = format!(
                "The return for order {} cannot be accepted: {}.",
                order.name, rejection
            );
            return ctx.reject(action, &rejection, spoken).await;
        }

        let spec = ReturnSpec {
            order_id: order.id.clone(),
            line_item_ids: order.line_items.iter().map(|i| i.id.clone()).collect(),
            reason: reason.to_string(),
        };
        let Some(record) = ctx.commerce().create_return(&spec).await? else {
            return ctx
                .reject(
                    action,
                    "Return could not be created",
                    "The return could not be created right now. Apologise and offer to connect the customer to a specialist.",
                )
                .await;
        };

        let pickup_date = (now + ChronoDuration::days(1)).date_naive();
        let pickup = ctx
            .commerce()
            .schedule_pickup(
                &order,
                &PickupRequest {
                    date: pickup_date,
                    address: order.shipping_address.clone(),
                    reference: record.id.clone(),
                },
            )
            .await?;

        let mut spoken = format!(
            "Return {} has been created for order {}.",
            record.id, order.name
        );
        match &pickup {
            Some(p) => spoken.push_str(&format!(
                " Pickup is scheduled for {}. The refund is processed after the item is received.",
                p.scheduled_date.format("%d %B")
            )),
            None => spoken.push_str(" Our courier partner will call to schedule the pickup."),
        }

        let result = AgentResult::success(
            format!("Return {} created", record.id),
            json!({
                "return_id": record.id,
                "status": record.status,
                "order_id": order.id,
                "reason": reason,
                "pickup": pickup,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}
