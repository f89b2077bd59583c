//! Product information and search.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::Product;
use crate::error::AgentError;
use crate::handler::AgentHandler;
use crate::types::{AgentOutcome, AgentResult, AgentType};

const LISTING_LIMIT: usize = 5;

pub struct ProductInquiryAgent;

fn describe(product: &Product) -> String {
    let stock = if product.available { "in stock" } else { "out of stock" };
    format!("{} at Rs {:.0} ({})", product.title, product.price, stock)
}

fn listing(products: &[Product]) -> String {
    products.iter().map(describe).collect::<Vec<_>>().join("; ")
}

#[async_trait]
impl AgentHandler for ProductInquiryAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::ProductInquiry
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn confidence(&self) -> f32 {
        0.8
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let action = ctx.record_action().await?;

        if let Some(product_id) = ctx.field("product_id") {
            if let Some(product) = ctx.commerce().get_product(product_id).await? {
                let mut spoken = format!("{}.", describe(&product));
                if let Some(description) = &product.description {
                    spoken.push_str(&format!(" {}", description));
                }
                let result = AgentResult::success(
                    format!("Product {} found", product.id),
                    json!({ "mode": "product", "product": product }),
                    spoken,
                );
                return ctx.succeed(action, result).await;
            }
        }

        if let Some(query) = ctx.field("product_query") {
            let found = ctx.commerce().search_products(query, LISTING_LIMIT).await?;
            if !found.is_empty() {
                let result = AgentResult::success(
                    format!("{} products match {}", found.len(), query),
                    json!({ "mode": "search", "query": query, "products": found }),
                    format!("Products matching \"{}\": {}.", query, listing(&found)),
                );
                return ctx.succeed(action, result).await;
            }
        }

        let popular = ctx.commerce().get_popular_products(LISTING_LIMIT).await?;
        if popular.is_empty() {
            return ctx
                .reject(
                    action,
                    "No products available",
                    "No product information is available right now. Offer to send details by SMS later.",
                )
                .await;
        }

        let mut spoken = String::new();
        if let Some(query) = ctx.field("product_query") {
            spoken.push_str(&format!("Nothing matched \"{}\". ", query));
        }
        spoken.push_str(&format!("Popular products right now: {}.", listing(&popular)));

        let result = AgentResult::success(
            format!("{} popular products", popular.len()),
            json!({ "mode": "popular", "products": popular }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{completed, context};
    use crate::memory::InMemoryCommerce;
    use std::sync::Arc;

    fn product(id: &str, title: &str) -> Product {
        Product {
            id: id.to_string(),
            title: title.to_string(),
            price: 799.0,
            available: true,
            inventory_quantity: Some(12),
            description: Some("Hand block printed.".to_string()),
        }
    }

    fn catalogue() -> Arc<InMemoryCommerce> {
        let mut commerce = InMemoryCommerce::new();
        for (i, title) in ["Silk Saree", "Cotton Kurta", "Linen Shirt", "Kurta Pyjama Set", "Shawl", "Stole"]
            .iter()
            .enumerate()
        {
            commerce = commerce.with_product(product(&format!("p-{}", i), title));
        }
        Arc::new(commerce)
    }

    #[tokio::test]
    async fn test_inquiry_by_product_id() {
        let (ctx, _) = context(catalogue(), AgentType::ProductInquiry, &[("product_id", "p-0")]);
        let result = completed(ProductInquiryAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["mode"], "product");
        assert!(result.context_update.contains("Silk Saree"));
    }

    #[tokio::test]
    async fn test_inquiry_search() {
        let (ctx, _) = context(catalogue(), AgentType::ProductInquiry, &[("product_query", "kurta")]);
        let result = completed(ProductInquiryAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["mode"], "search");
        assert_eq!(result.data["products"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_search_falls_back_to_popular() {
        let commerce = catalogue();
        let (ctx, _) = context(
            commerce.clone(),
            AgentType::ProductInquiry,
            &[("product_query", "laptop")],
        );
        let result = completed(ProductInquiryAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["mode"], "popular");
        assert_eq!(result.data["products"].as_array().unwrap().len(), LISTING_LIMIT);
        assert!(result.context_update.starts_with("Nothing matched"));
        assert_eq!(
            commerce.calls(),
            vec!["search_products:laptop", "get_popular_products:5"]
        );
    }

    #[tokio::test]
    async fn test_no_data_lists_popular() {
        let (ctx, _) = context(catalogue(), AgentType::ProductInquiry, &[]);
        let result = completed(ProductInquiryAgent.execute(&ctx).await.unwrap());
        assert_eq!(result.data["mode"], "popular");
    }

    #[tokio::test]
    async fn test_empty_catalogue_rejects() {
        let (ctx, _) = context(Arc::new(InMemoryCommerce::new()), AgentType::ProductInquiry, &[]);
        let result = completed(ProductInquiryAgent.execute(&ctx).await.unwrap());
        assert!(!result.success);
    }
}
