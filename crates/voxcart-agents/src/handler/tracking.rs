//! Shipment tracking.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct TrackingAgent;

#[async_trait]
impl AgentHandler for TrackingAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Tracking
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

        let Some(tracking_number) = order.tracking_number.as_deref() else {
            return ctx
                .reject(
                    action,
                    "Order has not shipped yet",
                    format!(
                        "Order {} has not shipped yet, so there is no tracking number. It is {}.",
                        order.name,
                        order.status_label()
                    ),
                )
                .await;
        };

        let info = ctx.commerce().get_tracking_info(tracking_number).await?;

        let (status, location, eta) = match &info {
            Some(info) => (
                info.status.clone(),
                info.current_location.clone(),
                info.estimated_delivery,
            ),
            None => (order.status_label().to_string(), None, None),
        };
        let carrier = info
            .as_ref()
            .map(|i| i.carrier.clone())
            .or_else(|| order.tracking_company.clone())
            .unwrap_or_else(|| "our courier partner".to_string());

        let mut spoken = format!(
            "Order {} is with {} (tracking number {}). Status: {}.",
            order.name, carrier, tracking_number, status
        );
        if let Some(location) = &location {
            spoken.push_str(&format!(" Current location: {}.", location));
        }
        if let Some(eta) = eta {
            spoken.push_str(&format!(" Expected delivery by {}.", eta.format("%d %B")));
        }

        let result = AgentResult::success(
            format!("Tracking {} is {}", tracking_number, status),
            json!({
                "order_id": order.id,
                "tracking_number": tracking_number,
                "carrier": carrier,
                "status": status,
                "current_location": location,
                "estimated_delivery": eta,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}
