//! Exchanges for delivered orders.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::{ExchangeSpec, PickupRequest};
use crate::error::AgentError;
use crate::handler::{delivery_window_rejection, order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct ExchangeAgent;

#[async_trait]
impl AgentHandler for ExchangeAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Exchange
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id"]
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let reason = ctx.field("reason").unwrap_or("Customer requested exchange");
        let preferred_variant = ctx.field("preferred_variant").map(str::to_string);
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        let now = ctx.now();
        if let Some(rejection) =
            delivery_window_rejection(&order, ctx.policy().exchange_window, now, "Exchange")
        {
            let spoken = format!(
                "The exchange for order {} cannot be accepted: {}.",
                order.name, rejection
            );
            return ctx.reject(action, &rejection, spoken).await;
        }

        let spec = ExchangeSpec {
            order_id: order.id.clone(),
            line_item_ids: order.line_items.iter().map(|i| i.id.clone()).collect(),
            reason: reason.to_string(),
            preferred_variant: preferred_variant.clone(),
        };
        let Some(record) = ctx.commerce().create_exchange(&spec).await? else {
            return ctx
                .reject(
                    action,
                    "Exchange could not be created",
                    "The exchange could not be created right now. Apologise and offer to escalate.",
                )
                .await;
        };

        let pickup = ctx
            .commerce()
            .schedule_pickup(
                &order,
                &PickupRequest {
                    date: (now + ChronoDuration::days(1)).date_naive(),
                    address: order.shipping_address.clone(),
                    reference: record.id.clone(),
                },
            )
            .await?;

        let mut spoken = format!(
            "Exchange {} has been created for order {}.",
            record.id, order.name
        );
        if let Some(variant) = &preferred_variant {
            spoken.push_str(&format!(" The replacement will be {}.", variant));
        }
        if let Some(p) = &pickup {
            spoken.push_str(&format!(
                " Pickup of the original item is scheduled for {}; the replacement ships once it is picked up.",
                p.scheduled_date.format("%d %B")
            ));
        }

        let result = AgentResult::success(
            format!("Exchange {} created", record.id),
            json!({
                "exchange_id": record.id,
                "status": record.status,
                "order_id": order.id,
                "preferred_variant": preferred_variant,
                "pickup": pickup,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}
