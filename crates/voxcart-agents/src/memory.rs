//! In-memory collaborators.
//!
//! `InMemoryCommerce` backs local runs without a commerce gateway and the
//! test suites; `InMemoryActionStore` is the audit store used alongside it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use voxcart_core::error::VoxcartError;
use voxcart_core::types::{ActionId, ActionRecord, ActionStatus, NewAction, Timestamp};

use crate::commerce::{
    Address, CancelSpec, CancellationRecord, CommerceConnector, Customer, ExchangeRecord,
    ExchangeSpec, Invoice, NewCustomer, Order, PickupRecord, PickupRequest, Product, RefundRecord,
    RefundSpec, ReturnRecord, ReturnSpec, TrackingInfo, Transaction,
};
use crate::error::CommerceError;

#[derive(Default)]
struct CommerceState {
    orders: HashMap<String, Order>,
    transactions: HashMap<String, Vec<Transaction>>,
    products: Vec<Product>,
    tracking: HashMap<String, TrackingInfo>,
    customers: Vec<Customer>,
    returns: Vec<ReturnSpec>,
    refunds: Vec<RefundSpec>,
    exchanges: Vec<ExchangeSpec>,
    calls: Vec<String>,
}

/// Commerce backend held entirely in memory.
#[derive(Default)]
pub struct InMemoryCommerce {
    state: Mutex<CommerceState>,
    stall: AtomicBool,
    failure: Mutex<Option<CommerceError>>,
}

impl InMemoryCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(self, order: Order) -> Self {
        self.lock().orders.insert(order.id.clone(), order);
        self
    }

    pub fn with_transactions(self, order_id: &str, transactions: Vec<Transaction>) -> Self {
        self.lock()
            .transactions
            .insert(order_id.to_string(), transactions);
        self
    }

    pub fn with_product(self, product: Product) -> Self {
        self.lock().products.push(product);
        self
    }

    pub fn with_tracking(self, info: TrackingInfo) -> Self {
        self.lock()
            .tracking
            .insert(info.tracking_number.clone(), info);
        self
    }

    pub fn with_customer(self, customer: Customer) -> Self {
        self.lock().customers.push(customer);
        self
    }

    /// Make every order lookup hang forever.
    pub fn stall_lookups(&self) {
        self.stall.store(true, Ordering::SeqCst);
    }

    /// Make every call fail with the given error.
    pub fn fail_with(&self, error: CommerceError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    /// Connector calls in order, as `method:argument`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn refunds(&self) -> Vec<RefundSpec> {
        self.lock().refunds.clone()
    }

    pub fn returns(&self) -> Vec<ReturnSpec> {
        self.lock().returns.clone()
    }

    pub fn exchanges(&self) -> Vec<ExchangeSpec> {
        self.lock().exchanges.clone()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.lock().orders.get(order_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CommerceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, call: String) -> Result<(), CommerceError> {
        self.lock().calls.push(call);
        match self.failure.lock() {
            Ok(failure) => match failure.as_ref() {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl CommerceConnector for InMemoryCommerce {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, CommerceError> {
        self.enter(format!("get_order:{}", order_id))?;
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.lock().orders.get(order_id).cloned())
    }

    async fn get_order_transactions(
        &self,
        order_id: &str,
    ) -> Result<Vec<Transaction>, CommerceError> {
        self.enter(format!("get_order_transactions:{}", order_id))?;
        Ok(self
            .lock()
            .transactions
            .get(order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_return(&self, spec: &ReturnSpec) -> Result<Option<ReturnRecord>, CommerceError> {
        self.enter(format!("create_return:{}", spec.order_id))?;
        let mut state = self.lock();
        if !state.orders.contains_key(&spec.order_id) {
            return Ok(None);
        }
        state.returns.push(spec.clone());
        Ok(Some(ReturnRecord {
            id: format!("RET-{}-{}", spec.order_id, state.returns.len()),
            status: "requested".to_string(),
        }))
    }

    async fn create_refund(&self, spec: &RefundSpec) -> Result<Option<RefundRecord>, CommerceError> {
        self.enter(format!("create_refund:{}", spec.order_id))?;
        let mut state = self.lock();
        if !state.orders.contains_key(&spec.order_id) {
            return Ok(None);
        }
        state.refunds.push(spec.clone());
        Ok(Some(RefundRecord {
            id: format!("REF-{}-{}", spec.order_id, state.refunds.len()),
            amount: spec.amount,
            status: "pending".to_string(),
        }))
    }

    async fn cancel_order(
        &self,
        spec: &CancelSpec,
    ) -> Result<Option<CancellationRecord>, CommerceError> {
        self.enter(format!("cancel_order:{}", spec.order_id))?;
        let mut state = self.lock();
        let Some(order) = state.orders.get_mut(&spec.order_id) else {
            return Ok(None);
        };
        let now = Utc::now();
        order.cancelled_at = Some(now);
        Ok(Some(CancellationRecord {
            order_id: spec.order_id.clone(),
            cancelled_at: now,
            refund_amount: spec.refund.then_some(order.total_price),
        }))
    }

    async fn update_shipping_address(
        &self,
        order_id: &str,
        address: &Address,
    ) -> Result<Option<Order>, CommerceError> {
        self.enter(format!("update_shipping_address:{}", order_id))?;
        let mut state = self.lock();
        Ok(state.orders.get_mut(order_id).map(|order| {
            order.shipping_address = Some(address.clone());
            order.clone()
        }))
    }

    async fn update_tracking_address(
        &self,
        tracking_number: &str,
        _address: &Address,
    ) -> Result<bool, CommerceError> {
        self.enter(format!("update_tracking_address:{}", tracking_number))?;
        Ok(true)
    }

    async fn create_exchange(
        &self,
        spec: &ExchangeSpec,
    ) -> Result<Option<ExchangeRecord>, CommerceError> {
        self.enter(format!("create_exchange:{}", spec.order_id))?;
        let mut state = self.lock();
        if !state.orders.contains_key(&spec.order_id) {
            return Ok(None);
        }
        state.exchanges.push(spec.clone());
        Ok(Some(ExchangeRecord {
            id: format!("EXC-{}-{}", spec.order_id, state.exchanges.len()),
            status: "requested".to_string(),
        }))
    }

    async fn schedule_pickup(
        &self,
        order: &Order,
        request: &PickupRequest,
    ) -> Result<Option<PickupRecord>, CommerceError> {
        self.enter(format!("schedule_pickup:{}", order.id))?;
        Ok(Some(PickupRecord {
            pickup_id: format!("PU-{}", request.reference),
            scheduled_date: request.date,
        }))
    }

    async fn search_products(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Product>, CommerceError> {
        self.enter(format!("search_products:{}", query))?;
        let needle = query.to_lowercase();
        Ok(self
            .lock()
            .products
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_popular_products(&self, limit: usize) -> Result<Vec<Product>, CommerceError> {
        self.enter(format!("get_popular_products:{}", limit))?;
        Ok(self.lock().products.iter().take(limit).cloned().collect())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, CommerceError> {
        self.enter(format!("get_product:{}", product_id))?;
        Ok(self
            .lock()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned())
    }

    async fn create_customer(
        &self,
        data: &NewCustomer,
    ) -> Result<Option<Customer>, CommerceError> {
        self.enter(format!("create_customer:{}", data.email))?;
        let mut state = self.lock();
        if state
            .customers
            .iter()
            .any(|c| c.email == data.email || c.phone == data.phone)
        {
            return Ok(None);
        }
        let customer = Customer {
            id: format!("CUST-{}", state.customers.len() + 1),
            email: data.email.clone(),
            phone: data.phone.clone(),
            first_name: data.first_name.clone(),
        };
        state.customers.push(customer.clone());
        Ok(Some(customer))
    }

    async fn generate_invoice(&self, order_id: &str) -> Result<Option<Invoice>, CommerceError> {
        self.enter(format!("generate_invoice:{}", order_id))?;
        Ok(self.lock().orders.get(order_id).map(|order| Invoice {
            invoice_number: format!("INV-{}", order.id),
            order_id: order.id.clone(),
            amount: order.total_price,
            url: None,
        }))
    }

    async fn send_invoice(&self, invoice: &Invoice, email: &str) -> Result<bool, CommerceError> {
        self.enter(format!("send_invoice:{}:{}", invoice.invoice_number, email))?;
        Ok(true)
    }

    async fn send_welcome_message(&self, customer: &Customer) -> Result<bool, CommerceError> {
        self.enter(format!("send_welcome_message:{}", customer.id))?;
        Ok(true)
    }

    async fn get_tracking_info(
        &self,
        tracking_number: &str,
    ) -> Result<Option<TrackingInfo>, CommerceError> {
        self.enter(format!("get_tracking_info:{}", tracking_number))?;
        Ok(self.lock().tracking.get(tracking_number).cloned())
    }
}

/// Audit store held in memory.
#[derive(Default)]
pub struct InMemoryActionStore {
    records: Mutex<Vec<ActionRecord>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in creation order.
    pub fn records(&self) -> Vec<ActionRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ActionRecord>>, VoxcartError> {
        self.records
            .lock()
            .map_err(|e| VoxcartError::Storage(format!("Action store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl crate::store::ActionStore for InMemoryActionStore {
    async fn create(&self, action: NewAction) -> Result<ActionId, VoxcartError> {
        let id = ActionId::new();
        let now = Timestamp::now();
        self.lock()?.push(ActionRecord {
            id,
            call_id: action.call_id,
            action_type: action.action_type,
            input: action.input,
            confidence: action.confidence,
            status: ActionStatus::Pending,
            detail: None,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update_status(
        &self,
        id: ActionId,
        status: ActionStatus,
        detail: Option<String>,
    ) -> Result<(), VoxcartError> {
        let mut records = self.lock()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| VoxcartError::NotFound(format!("action {}", id)))?;
        record.status = status;
        record.detail = detail;
        record.updated_at = Timestamp::now();
        Ok(())
    }

    async fn get_by_id(&self, id: ActionId) -> Result<Option<ActionRecord>, VoxcartError> {
        Ok(self.lock()?.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ActionStore;
    use voxcart_core::types::CallId;

    fn product(id: &str, title: &str) -> Product {
        Product {
            id: id.to_string(),
            title: title.to_string(),
            price: 499.0,
            available: true,
            inventory_quantity: Some(5),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_limited() {
        let commerce = InMemoryCommerce::new()
            .with_product(product("p1", "Cotton Kurta"))
            .with_product(product("p2", "Silk Kurta"))
            .with_product(product("p3", "Denim Jeans"));

        let hits = commerce.search_products("KURTA", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");
        assert_eq!(commerce.get_popular_products(10).await.unwrap().len(), 3);
        assert_eq!(
            commerce.calls(),
            vec!["search_products:KURTA", "get_popular_products:10"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_customer_returns_none() {
        let commerce = InMemoryCommerce::new();
        let data = NewCustomer {
            email: "a@b.in".to_string(),
            phone: "9876543210".to_string(),
            first_name: None,
        };
        assert!(commerce.create_customer(&data).await.unwrap().is_some());
        assert!(commerce.create_customer(&data).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_with_applies_to_every_call() {
        let commerce = InMemoryCommerce::new();
        commerce.fail_with(CommerceError::Request("connection reset".to_string()));
        assert!(commerce.get_order("1").await.is_err());
        assert!(commerce.get_popular_products(3).await.is_err());
    }

    #[tokio::test]
    async fn test_action_store_lifecycle() {
        let store = InMemoryActionStore::new();
        let id = store
            .create(NewAction {
                call_id: CallId::from("c1"),
                action_type: "RefundAgent".to_string(),
                input: serde_json::json!({}),
                confidence: 0.9,
            })
            .await
            .unwrap();
        store
            .update_status(id, ActionStatus::Failed, Some("nope".to_string()))
            .await
            .unwrap();
        let record = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Failed);
        assert_eq!(store.records().len(), 1);

        let missing = store
            .update_status(ActionId::new(), ActionStatus::Success, None)
            .await;
        assert!(matches!(missing, Err(VoxcartError::NotFound(_))));
    }
}
