//! E-commerce backend port.
//!
//! Agents reach the store only through [`CommerceConnector`]. Lookups return
//! `Ok(None)` (or an empty list) for "not found"; `Err` is reserved for
//! transport and protocol failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    pub province: String,
    pub country: String,
    pub zip: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    /// Single-line rendering for spoken confirmations.
    pub fn one_line(&self) -> String {
        let mut parts: Vec<&str> = vec![self.address1.as_str()];
        if let Some(line2) = self.address2.as_deref() {
            parts.push(line2);
        }
        parts.extend([self.city.as_str(), self.province.as_str(), self.zip.as_str()]);
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub title: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Customer-facing order number ("#1001").
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    /// "paid", "pending", "authorized", "refunded", "partially_refunded", "voided".
    pub financial_status: String,
    /// None until the order ships; "shipped", "fulfilled", "delivered" afterwards.
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub fulfilled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub total_price: f64,
    pub currency: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_company: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    /// Payment gateway name; "cod" / "cash_on_delivery" for COD orders.
    #[serde(default)]
    pub payment_gateway: Option<String>,
}

impl Order {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    /// Shipped, fulfilled or delivered.
    pub fn has_shipped(&self) -> bool {
        matches!(
            self.fulfillment_status.as_deref(),
            Some("shipped") | Some("fulfilled") | Some("delivered")
        )
    }

    /// Delivery time as far as the store knows it.
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        match self.fulfillment_status.as_deref() {
            Some("fulfilled") | Some("delivered") => self.fulfilled_at,
            _ => None,
        }
    }

    pub fn is_cod(&self) -> bool {
        self.payment_gateway
            .as_deref()
            .map(|g| {
                let g = g.to_lowercase();
                g == "cod" || g.contains("cash on delivery") || g.contains("cash_on_delivery")
            })
            .unwrap_or(false)
    }

    /// Spoken status summary.
    pub fn status_label(&self) -> &'static str {
        if self.is_cancelled() {
            "cancelled"
        } else {
            match self.fulfillment_status.as_deref() {
                Some("delivered") | Some("fulfilled") => "delivered",
                Some("shipped") => "shipped",
                _ => "being processed",
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// "sale", "capture", "authorization", "refund", "void".
    pub kind: String,
    /// "success", "pending", "failure", "error".
    pub status: String,
    pub amount: f64,
    #[serde(default)]
    pub gateway: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_successful_charge(&self) -> bool {
        matches!(self.kind.as_str(), "sale" | "capture") && self.status == "success"
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failure" | "error")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub available: bool,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub carrier: String,
    pub status: String,
    #[serde(default)]
    pub current_location: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_number: String,
    pub order_id: String,
    pub amount: f64,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSpec {
    pub order_id: String,
    pub line_item_ids: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundSpec {
    pub order_id: String,
    pub amount: f64,
    pub reason: String,
    /// Charge being refunded, when a specific one is targeted.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: String,
    pub amount: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelSpec {
    pub order_id: String,
    pub reason: String,
    pub refund: bool,
    pub restock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub order_id: String,
    pub cancelled_at: DateTime<Utc>,
    #[serde(default)]
    pub refund_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSpec {
    pub order_id: String,
    pub line_item_ids: Vec<String>,
    pub reason: String,
    #[serde(default)]
    pub preferred_variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRequest {
    pub date: chrono::NaiveDate,
    #[serde(default)]
    pub address: Option<Address>,
    /// Return or exchange id the pickup belongs to.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRecord {
    pub pickup_id: String,
    pub scheduled_date: chrono::NaiveDate,
}

// =============================================================================
// Port
// =============================================================================

/// Capability interface to the e-commerce backend.
#[async_trait]
pub trait CommerceConnector: Send + Sync {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, CommerceError>;

    async fn get_order_transactions(
        &self,
        order_id: &str,
    ) -> Result<Vec<Transaction>, CommerceError>;

    async fn create_return(&self, spec: &ReturnSpec) -> Result<Option<ReturnRecord>, CommerceError>;

    async fn create_refund(&self, spec: &RefundSpec) -> Result<Option<RefundRecord>, CommerceError>;

    async fn cancel_order(
        &self,
        spec: &CancelSpec,
    ) -> Result<Option<CancellationRecord>, CommerceError>;

    async fn update_shipping_address(
        &self,
        order_id: &str,
        address: &Address,
    ) -> Result<Option<Order>, CommerceError>;

    /// Returns false if the carrier did not accept the change.
    async fn update_tracking_address(
        &self,
        tracking_number: &str,
        address: &Address,
    ) -> Result<bool, CommerceError>;

    async fn create_exchange(
        &self,
        spec: &ExchangeSpec,
    ) -> Result<Option<ExchangeRecord>, CommerceError>;

    async fn schedule_pickup(
        &self,
        order: &Order,
        request: &PickupRequest,
    ) -> Result<Option<PickupRecord>, CommerceError>;

    async fn search_products(&self, query: &str, limit: usize)
        -> Result<Vec<Product>, CommerceError>;

    async fn get_popular_products(&self, limit: usize) -> Result<Vec<Product>, CommerceError>;

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CommerceError>;

    /// `None` when an account with that phone or email already exists.
    async fn create_customer(&self, data: &NewCustomer)
        -> Result<Option<Customer>, CommerceError>;

    async fn generate_invoice(&self, order_id: &str) -> Result<Option<Invoice>, CommerceError>;

    async fn send_invoice(&self, invoice: &Invoice, email: &str) -> Result<bool, CommerceError>;

    async fn send_welcome_message(&self, customer: &Customer) -> Result<bool, CommerceError>;

    async fn get_tracking_info(
        &self,
        tracking_number: &str,
    ) -> Result<Option<TrackingInfo>, CommerceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order {
            id: "5001".to_string(),
            name: "#5001".to_string(),
            email: None,
            phone: None,
            created_at: Utc::now(),
            financial_status: "paid".to_string(),
            fulfillment_status: None,
            fulfilled_at: None,
            cancelled_at: None,
            total_price: 999.0,
            currency: "INR".to_string(),
            line_items: Vec::new(),
            tracking_number: None,
            tracking_company: None,
            shipping_address: None,
            payment_gateway: None,
        }
    }

    #[test]
    fn test_order_status_label() {
        let mut o = order();
        assert_eq!(o.status_label(), "being processed");
        o.fulfillment_status = Some("shipped".to_string());
        assert_eq!(o.status_label(), "shipped");
        assert!(o.has_shipped());
        assert!(o.delivered_at().is_none());
        o.fulfillment_status = Some("fulfilled".to_string());
        o.fulfilled_at = Some(Utc::now());
        assert_eq!(o.status_label(), "delivered");
        assert!(o.delivered_at().is_some());
        o.cancelled_at = Some(Utc::now());
        assert_eq!(o.status_label(), "cancelled");
    }

    #[test]
    fn test_order_is_cod() {
        let mut o = order();
        assert!(!o.is_cod());
        o.payment_gateway = Some("Cash on Delivery (COD)".to_string());
        assert!(o.is_cod());
        o.payment_gateway = Some("cod".to_string());
        assert!(o.is_cod());
        o.payment_gateway = Some("razorpay".to_string());
        assert!(!o.is_cod());
    }

    #[test]
    fn test_transaction_predicates() {
        let tx = Transaction {
            id: "t1".to_string(),
            kind: "capture".to_string(),
            status: "success".to_string(),
            amount: 10.0,
            gateway: None,
            created_at: Utc::now(),
        };
        assert!(tx.is_successful_charge());
        assert!(!tx.is_failed());
        let failed = Transaction {
            status: "error".to_string(),
            ..tx
        };
        assert!(failed.is_failed());
        assert!(!failed.is_successful_charge());
    }

    #[test]
    fn test_address_one_line_skips_empty_parts() {
        let address = Address {
            address1: "12 MG Road".to_string(),
            address2: None,
            city: "Bengaluru".to_string(),
            province: "Karnataka".to_string(),
            country: "India".to_string(),
            zip: "560001".to_string(),
            phone: None,
        };
        assert_eq!(address.one_line(), "12 MG Road, Bengaluru, Karnataka, 560001");
    }
}
