//! REST commerce gateway adapter.
//!
//! Speaks JSON to the store gateway at `commerce.base_url`. A 404 (and a
//! 409 for customer creation) is "not found" and maps to `Ok(None)`, an
//! empty list or `false`; any other non-success status is an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use voxcart_agents::commerce::{
    Address, CancelSpec, CancellationRecord, Customer, ExchangeRecord, ExchangeSpec, Invoice,
    NewCustomer, Order, PickupRecord, PickupRequest, Product, RefundRecord, RefundSpec,
    ReturnRecord, ReturnSpec, TrackingInfo, Transaction,
};
use voxcart_agents::{CommerceConnector, CommerceError};
use voxcart_core::config::CommerceConfig;
use voxcart_core::error::VoxcartError;

pub struct HttpCommerceConnector {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCommerceConnector {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VoxcartError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxcartError::Commerce(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build from config, reading the bearer token from `api_token_env`.
    pub fn from_config(config: &CommerceConfig) -> Result<Self, VoxcartError> {
        if config.base_url.trim().is_empty() {
            return Err(VoxcartError::Config(
                "commerce.base_url is empty".to_string(),
            ));
        }
        let token = std::env::var(&config.api_token_env).ok();
        if token.is_none() {
            tracing::warn!(
                env = %config.api_token_env,
                "No commerce token set; gateway requests are unauthenticated"
            );
        }
        Self::new(
            &config.base_url,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and decode. Statuses in `absent` yield `Ok(None)`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        absent: &[StatusCode],
    ) -> Result<Option<T>, CommerceError> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| CommerceError::Request(e.to_string()))?;

        let status = response.status();
        if absent.contains(&status) {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommerceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| CommerceError::Decode(e.to_string()))
    }

    /// Fire-and-forget style calls: success is `true`, a rejection `false`.
    async fn accepted(&self, request: RequestBuilder) -> Result<bool, CommerceError> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| CommerceError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            return Ok(false);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CommerceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

const NOT_FOUND: &[StatusCode] = &[StatusCode::NOT_FOUND];

#[async_trait]
impl CommerceConnector for HttpCommerceConnector {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, CommerceError> {
        let request = self.client.get(self.url(&format!("/orders/{}", order_id)));
        self.fetch(request, NOT_FOUND).await
    }

    async fn get_order_transactions(
        &self,
        order_id: &str,
    ) -> Result<Vec<Transaction>, CommerceError> {
        let request = self
            .client
            .get(self.url(&format!("/orders/{}/transactions", order_id)));
        Ok(self.fetch(request, NOT_FOUND).await?.unwrap_or_default())
    }

    async fn create_return(&self, spec: &ReturnSpec) -> Result<Option<ReturnRecord>, CommerceError> {
        let request = self.client.post(self.url("/returns")).json(spec);
        self.fetch(request, NOT_FOUND).await
    }

    async fn create_refund(&self, spec: &RefundSpec) -> Result<Option<RefundRecord>, CommerceError> {
        let request = self.client.post(self.url("/refunds")).json(spec);
        self.fetch(request, NOT_FOUND).await
    }

    async fn cancel_order(
        &self,
        spec: &CancelSpec,
    ) -> Result<Option<CancellationRecord>, CommerceError> {
        let request = self
            .client
            .post(self.url(&format!("/orders/{}/cancel", spec.order_id)))
            .json(spec);
        self.fetch(request, NOT_FOUND).await
    }

    async fn update_shipping_address(
        &self,
        order_id: &str,
        address: &Address,
    ) -> Result<Option<Order>, CommerceError> {
        let request = self
            .client
            .put(self.url(&format!("/orders/{}/shipping_address", order_id)))
            .json(address);
        self.fetch(request, NOT_FOUND).await
    }

    async fn update_tracking_address(
        &self,
        tracking_number: &str,
        address: &Address,
    ) -> Result<bool, CommerceError> {
        let request = self
            .client
            .put(self.url(&format!("/tracking/{}/address", tracking_number)))
            .json(address);
        self.accepted(request).await
    }

    async fn create_exchange(
        &self,
        spec: &ExchangeSpec,
    ) -> Result<Option<ExchangeRecord>, CommerceError> {
        let request = self.client.post(self.url("/exchanges")).json(spec);
        self.fetch(request, NOT_FOUND).await
    }

    async fn schedule_pickup(
        &self,
        order: &Order,
        request: &PickupRequest,
    ) -> Result<Option<PickupRecord>, CommerceError> {
        let http = self
            .client
            .post(self.url(&format!("/orders/{}/pickups", order.id)))
            .json(request);
        self.fetch(http, NOT_FOUND).await
    }

    async fn search_products(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Product>, CommerceError> {
        let request = self
            .client
            .get(self.url("/products/search"))
            .query(&[("q", query.to_string()), ("limit", limit.to_string())]);
        Ok(self.fetch(request, NOT_FOUND).await?.unwrap_or_default())
    }

    async fn get_popular_products(&self, limit: usize) -> Result<Vec<Product>, CommerceError> {
        let request = self
            .client
            .get(self.url("/products/popular"))
            .query(&[("limit", limit.to_string())]);
        Ok(self.fetch(request, NOT_FOUND).await?.unwrap_or_default())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CommerceError> {
        let request = self.client.get(self.url(&format!("/products/{}", product_id)));
        self.fetch(request, NOT_FOUND).await
    }

    async fn create_customer(
        &self,
        data: &NewCustomer,
    ) -> Result<Option<Customer>, CommerceError> {
        let request = self.client.post(self.url("/customers")).json(data);
        self.fetch(request, &[StatusCode::NOT_FOUND, StatusCode::CONFLICT])
            .await
    }

    async fn generate_invoice(&self, order_id: &str) -> Result<Option<Invoice>, CommerceError> {
        let request = self
            .client
            .post(self.url(&format!("/orders/{}/invoice", order_id)));
        self.fetch(request, NOT_FOUND).await
    }

    async fn send_invoice(&self, invoice: &Invoice, email: &str) -> Result<bool, CommerceError> {
        let request = self
            .client
            .post(self.url(&format!("/invoices/{}/send", invoice.invoice_number)))
            .json(&json!({ "email": email }));
        self.accepted(request).await
    }

    async fn send_welcome_message(&self, customer: &Customer) -> Result<bool, CommerceError> {
        let request = self
            .client
            .post(self.url(&format!("/customers/{}/welcome", customer.id)));
        self.accepted(request).await
    }

    async fn get_tracking_info(
        &self,
        tracking_number: &str,
    ) -> Result<Option<TrackingInfo>, CommerceError> {
        let request = self
            .client
            .get(self.url(&format!("/tracking/{}", tracking_number)));
        self.fetch(request, NOT_FOUND).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;

    fn order_json(id: &str) -> Value {
        json!({
            "id": id,
            "name": format!("#{}", id),
            "created_at": "2026-10-10T09:30:00Z",
            "financial_status": "paid",
            "fulfillment_status": "shipped",
            "total_price": 1499.0,
            "currency": "INR",
            "tracking_number": "DL123",
            "payment_gateway": "razorpay"
        })
    }

    /// A tiny stand-in for the store gateway.
    async fn gateway() -> String {
        let app = Router::new()
            .route(
                "/orders/{id}",
                get(|Path(id): Path<String>| async move {
                    if id == "5001" {
                        Ok(Json(order_json(&id)))
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/orders/{id}/transactions",
                get(|| async { Err::<Json<Value>, _>(StatusCode::BAD_GATEWAY) }),
            )
            .route(
                "/products/search",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!([{
                        "id": "p1",
                        "title": format!("{} kurta", params.get("q").cloned().unwrap_or_default()),
                        "price": 899.0,
                        "available": true,
                        "limit_seen": params.get("limit").cloned()
                    }]))
                }),
            )
            .route(
                "/customers",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let authed = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer gw-token");
                    if !authed {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    if body["phone"] == "9876543210" {
                        return Err(StatusCode::CONFLICT);
                    }
                    Ok(Json(json!({
                        "id": "c1",
                        "email": body["email"],
                        "phone": body["phone"]
                    })))
                }),
            )
            .route(
                "/tracking/{number}/address",
                axum::routing::put(|Path(number): Path<String>| async move {
                    if number == "DL123" {
                        StatusCode::NO_CONTENT
                    } else {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    async fn connector(token: Option<&str>) -> HttpCommerceConnector {
        HttpCommerceConnector::new(
            &gateway().await,
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_order_found_and_missing() {
        let commerce = connector(None).await;
        let order = commerce.get_order("5001").await.unwrap().unwrap();
        assert_eq!(order.name, "#5001");
        assert!(order.has_shipped());
        assert_eq!(order.tracking_number.as_deref(), Some("DL123"));

        assert!(commerce.get_order("9999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_error() {
        let commerce = connector(None).await;
        let err = commerce.get_order_transactions("5001").await.unwrap_err();
        assert!(matches!(err, CommerceError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_search_passes_query() {
        let commerce = connector(None).await;
        let products = commerce.search_products("cotton", 5).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "cotton kurta");
    }

    #[tokio::test]
    async fn test_create_customer_uses_token_and_conflict_is_none() {
        let commerce = connector(Some("gw-token")).await;
        let created = commerce
            .create_customer(&NewCustomer {
                email: "asha@example.com".to_string(),
                phone: "9123456780".to_string(),
                first_name: None,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.id, "c1");

        let existing = commerce
            .create_customer(&NewCustomer {
                email: "ravi@example.com".to_string(),
                phone: "9876543210".to_string(),
                first_name: None,
            })
            .await
            .unwrap();
        assert!(existing.is_none());

        let anonymous = connector(None).await;
        let err = anonymous
            .create_customer(&NewCustomer {
                email: "asha@example.com".to_string(),
                phone: "9123456780".to_string(),
                first_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_tracking_address_acceptance() {
        let commerce = connector(None).await;
        let address = Address {
            address1: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            province: "Karnataka".to_string(),
            country: "IN".to_string(),
            zip: "560001".to_string(),
            ..Address::default()
        };
        assert!(commerce.update_tracking_address("DL123", &address).await.unwrap());
        assert!(!commerce.update_tracking_address("XX000", &address).await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let commerce =
            HttpCommerceConnector::new("http://127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            commerce.get_product("p1").await,
            Err(CommerceError::Request(_))
        ));
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let config = CommerceConfig::default();
        assert!(matches!(
            HttpCommerceConnector::from_config(&config),
            Err(VoxcartError::Config(_))
        ));
    }
}
