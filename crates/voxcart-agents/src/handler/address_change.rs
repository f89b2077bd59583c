//! Shipping address changes before dispatch.

use async_trait::async_trait;
use serde_json::json;

use crate::address::parse_address;
use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::{order_not_found, AgentHandler};
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct AddressChangeAgent;

#[async_trait]
impl AgentHandler for AddressChangeAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::AddressChange
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["order_id", "new_address"]
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let order_id = ctx.require("order_id")?;
        let raw_address = ctx.require("new_address")?;
        let action = ctx.record_action().await?;

        let Some(order) = ctx.commerce().get_order(order_id).await? else {
            return order_not_found(ctx, action, order_id).await;
        };

        if order.is_cancelled() {
            return ctx
                .reject(
                    action,
                    "Order is cancelled",
                    format!("Order {} is cancelled, so its address cannot be changed.", order.name),
                )
                .await;
        }
        if order.has_shipped() {
            return ctx
                .reject(
                    action,
                    "Order has already shipped",
                    format!(
                        "Order {} has already shipped, so the address can no longer be changed. The customer can contact the courier using the tracking number.",
                        order.name
                    ),
                )
                .await;
        }
        let window = ctx.policy().address_change_window;
        if ctx.now() - order.created_at > window {
            let reason = format!(
                "Address change window expired ({} hours from order)",
                window.num_hours()
            );
            let spoken = format!(
                "The address for order {} can only be changed within {} hours of placing it.",
                order.name,
                window.num_hours()
            );
            return ctx.reject(action, &reason, spoken).await;
        }

        let Some(mut address) = parse_address(raw_address) else {
            return ctx
                .reject(
                    action,
                    "Address is missing a valid PIN code",
                    "The new address needs a valid 6-digit PIN code. Ask the customer to repeat the full address with the PIN code.",
                )
                .await;
        };
        if address.phone.is_none() {
            address.phone = order
                .shipping_address
                .as_ref()
                .and_then(|a| a.phone.clone())
                .or_else(|| order.phone.clone());
        }

        let Some(updated) = ctx
            .commerce()
            .update_shipping_address(&order.id, &address)
            .await?
        else {
            return ctx
                .reject(
                    action,
                    "Address update failed",
                    "The address could not be updated right now. Apologise and offer to escalate.",
                )
                .await;
        };

        let mut tracking_updated = None;
        if let Some(tracking) = updated.tracking_number.as_deref() {
            tracking_updated = Some(
                ctx.commerce()
                    .update_tracking_address(tracking, &address)
                    .await?,
            );
        }

        let result = AgentResult::success(
            format!("Address updated for order {}", updated.name),
            json!({
                "order_id": updated.id,
                "address": address,
                "tracking_updated": tracking_updated,
            }),
            format!(
                "The delivery address for order {} is now: {}.",
                updated.name,
                address.one_line()
            ),
        );
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{cancelled, completed, context, order, shipped};
    use crate::memory::InMemoryCommerce;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;

    const NEW_ADDRESS: &str = "Flat 9, Lake View, Kolkata, West Bengal 700091";

    #[tokio::test]
    async fn test_address_updated() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, _) = context(
            commerce.clone(),
            AgentType::AddressChange,
            &[("order_id", "5001"), ("new_address", NEW_ADDRESS)],
        );

        let result = completed(AddressChangeAgent.execute(&ctx).await.unwrap());
        assert!(result.success);
        assert!(result.data["tracking_updated"].is_null());

        let stored = commerce.order("5001").unwrap().shipping_address.unwrap();
        assert_eq!(stored.city, "Kolkata");
        assert_eq!(stored.zip, "700091");
        assert_eq!(stored.phone.as_deref(), Some("9876543210"));
    }

    #[tokio::test]
    async fn test_tracking_address_follows() {
        let mut labelled = order("5001");
        labelled.tracking_number = Some("AWB5".to_string());
        let commerce = Arc::new(InMemoryCommerce::new().with_order(labelled));
        let (ctx, _) = context(
            commerce.clone(),
            AgentType::AddressChange,
            &[("order_id", "5001"), ("new_address", NEW_ADDRESS)],
        );

        let result = completed(AddressChangeAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["tracking_updated"], true);
        assert!(commerce
            .calls()
            .contains(&"update_tracking_address:AWB5".to_string()));
    }

    #[tokio::test]
    async fn test_address_without_pin_rejected() {
        let commerce = Arc::new(InMemoryCommerce::new().with_order(order("5001")));
        let (ctx, _) = context(
            commerce,
            AgentType::AddressChange,
            &[("order_id", "5001"), ("new_address", "near the big temple, Pune")],
        );

        let result = completed(AddressChangeAgent.execute(&ctx).await.unwrap());
        assert!(!result.success);
        assert_eq!(result.message, "Address is missing a valid PIN code");
    }

    #[tokio::test]
    async fn test_address_change_blocked_states() {
        let mut old = order("1");
        old.created_at = Utc::now() - ChronoDuration::hours(30);
        let commerce = Arc::new(
            InMemoryCommerce::new()
                .with_order(old)
                .with_order(shipped(order("2"), "AWB2"))
                .with_order(cancelled(order("3"))),
        );

        let expected = [
            ("1", "Address change window expired (24 hours from order)"),
            ("2", "Order has already shipped"),
            ("3", "Order is cancelled"),
        ];
        for (id, message) in expected {
            let (ctx, _) = context(
                commerce.clone(),
                AgentType::AddressChange,
                &[("order_id", id), ("new_address", NEW_ADDRESS)],
            );
            let result = completed(AddressChangeAgent.execute(&ctx).await.unwrap());
            assert_eq!(result.message, message);
        }
    }
}
