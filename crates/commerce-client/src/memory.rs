//! In-process `CommercePlatform` for local runs and tests.
//!
//! Orders and products are seeded up front. Each operation can be made to
//! fail, and refunds can be scripted per order to return validation errors
//! or nothing at all. Everything the workflow writes is kept for inspection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use returns_types::domain::commerce::{
    CreatedRefund, LineItem, Money, OrderSummary, RefundCreation, RefundLineItem, RemoteOrder,
    UserError,
};
use returns_types::domain::product::ProductInput;
use returns_types::ports::commerce_platform::{CommercePlatform, PlatformError};
use rust_decimal::Decimal;

use crate::wire::join_user_errors;

/// The Admin API caps the count query at a single page.
const COUNT_LIMIT: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchOrder,
    ListOrders,
    CountOrders,
    AddTags,
    UpdateNote,
    CreateRefund,
    MarkRefunded,
    ListProducts,
}

#[derive(Debug, Clone)]
enum RefundScript {
    Reject(Vec<UserError>),
    Withhold,
}

/// A refund the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRefund {
    pub refund: CreatedRefund,
    pub note: String,
    pub line_items: Vec<RefundLineItem>,
}

#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    orders: Arc<DashMap<String, RemoteOrder>>,
    products: Arc<DashMap<String, ProductInput>>,
    tags: Arc<DashMap<String, Vec<String>>>,
    notes: Arc<DashMap<String, String>>,
    refunds: Arc<DashMap<String, IssuedRefund>>,
    refunded_notes: Arc<DashMap<String, String>>,
    failures: Arc<DashMap<Operation, String>>,
    refund_scripts: Arc<DashMap<String, RefundScript>>,
    calls: Arc<DashMap<Operation, usize>>,
    next_refund: Arc<AtomicU64>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_order(&self, order: RemoteOrder) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn seed_product(&self, product: ProductInput) {
        self.products.insert(product.shopify_id.clone(), product);
    }

    /// Every later call of `op` fails with an HTTP error carrying `message`.
    pub fn fail(&self, op: Operation, message: impl Into<String>) {
        self.failures.insert(op, message.into());
    }

    pub fn recover(&self, op: Operation) {
        self.failures.remove(&op);
    }

    /// Refunds for this order come back with these validation errors.
    pub fn reject_refund(&self, order_gid: &str, errors: Vec<UserError>) {
        self.refund_scripts
            .insert(order_gid.to_string(), RefundScript::Reject(errors));
    }

    /// Refunds for this order return neither a refund nor errors.
    pub fn withhold_refund(&self, order_gid: &str) {
        self.refund_scripts
            .insert(order_gid.to_string(), RefundScript::Withhold);
    }

    pub fn tags(&self, order_gid: &str) -> Vec<String> {
        self.tags
            .get(order_gid)
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn note(&self, order_gid: &str) -> Option<String> {
        self.notes.get(order_gid).map(|n| n.clone())
    }

    pub fn refund(&self, order_gid: &str) -> Option<IssuedRefund> {
        self.refunds.get(order_gid).map(|r| r.clone())
    }

    pub fn refunded_note(&self, order_gid: &str) -> Option<String> {
        self.refunded_notes.get(order_gid).map(|n| n.clone())
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.calls.get(&op).map(|c| *c).unwrap_or(0)
    }

    fn enter(&self, op: Operation) -> Result<(), PlatformError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get(&op) {
            Some(message) => Err(PlatformError::Http(message.clone())),
            None => Ok(()),
        }
    }

    fn require_order(&self, order_gid: &str) -> Result<(), PlatformError> {
        if self.orders.contains_key(order_gid) {
            Ok(())
        } else {
            Err(PlatformError::UserErrors(join_user_errors(&[
                order_missing("id"),
            ])))
        }
    }
}

fn order_missing(field: &str) -> UserError {
    UserError {
        field: vec![field.to_string()],
        message: "Order does not exist".to_string(),
    }
}

#[async_trait]
impl CommercePlatform for InMemoryPlatform {
    async fn fetch_order(&self, order_gid: &str) -> Result<Option<RemoteOrder>, PlatformError> {
        self.enter(Operation::FetchOrder)?;
        Ok(self.orders.get(order_gid).map(|o| o.clone()))
    }

    async fn list_orders(&self, first: i64) -> Result<Vec<OrderSummary>, PlatformError> {
        self.enter(Operation::ListOrders)?;
        let mut orders: Vec<RemoteOrder> = self.orders.iter().map(|o| o.value().clone()).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let first = usize::try_from(first).unwrap_or(0);
        Ok(orders.iter().take(first).map(RemoteOrder::summary).collect())
    }

    async fn count_orders(&self) -> Result<u64, PlatformError> {
        self.enter(Operation::CountOrders)?;
        Ok(self.orders.len().min(COUNT_LIMIT) as u64)
    }

    async fn add_order_tags(&self, order_gid: &str, tags: &[String]) -> Result<(), PlatformError> {
        self.enter(Operation::AddTags)?;
        self.require_order(order_gid)?;
        let mut existing = self.tags.entry(order_gid.to_string()).or_default();
        for tag in tags {
            if !existing.contains(tag) {
                existing.push(tag.clone());
            }
        }
        Ok(())
    }

    async fn update_order_note(&self, order_gid: &str, note: &str) -> Result<(), PlatformError> {
        self.enter(Operation::UpdateNote)?;
        self.require_order(order_gid)?;
        self.notes.insert(order_gid.to_string(), note.to_string());
        Ok(())
    }

    async fn create_refund(
        &self,
        order_gid: &str,
        note: &str,
        line_items: &[RefundLineItem],
    ) -> Result<RefundCreation, PlatformError> {
        self.enter(Operation::CreateRefund)?;

        if let Some(script) = self.refund_scripts.get(order_gid) {
            return Ok(match script.value() {
                RefundScript::Reject(errors) => RefundCreation {
                    refund: None,
                    user_errors: errors.clone(),
                },
                RefundScript::Withhold => RefundCreation::default(),
            });
        }
        if !self.orders.contains_key(order_gid) {
            return Ok(RefundCreation {
                refund: None,
                user_errors: vec![order_missing("orderId")],
            });
        }
        if self.refunds.contains_key(order_gid) {
            return Ok(RefundCreation {
                refund: None,
                user_errors: vec![UserError {
                    field: vec!["orderId".to_string()],
                    message: "Order has already been refunded".to_string(),
                }],
            });
        }

        let n = self.next_refund.fetch_add(1, Ordering::SeqCst) + 1;
        let refund = CreatedRefund {
            id: format!("gid://shopify/Refund/{n}"),
            created_at: Some(chrono::Utc::now()),
        };
        self.refunds.insert(
            order_gid.to_string(),
            IssuedRefund {
                refund: refund.clone(),
                note: note.to_string(),
                line_items: line_items.to_vec(),
            },
        );
        Ok(RefundCreation {
            refund: Some(refund),
            user_errors: Vec::new(),
        })
    }

    async fn mark_order_refunded(
        &self,
        order_gid: &str,
        note: &str,
    ) -> Result<(), PlatformError> {
        self.enter(Operation::MarkRefunded)?;
        self.require_order(order_gid)?;
        self.refunded_notes
            .insert(order_gid.to_string(), note.to_string());
        if let Some(mut order) = self.orders.get_mut(order_gid) {
            order.financial_status = Some("REFUNDED".to_string());
        }
        Ok(())
    }

    async fn list_products(&self, first: i64) -> Result<Vec<ProductInput>, PlatformError> {
        self.enter(Operation::ListProducts)?;
        let mut products: Vec<ProductInput> =
            self.products.iter().map(|p| p.value().clone()).collect();
        products.sort_by(|a, b| a.shopify_id.cmp(&b.shopify_id));
        let first = usize::try_from(first).unwrap_or(0);
        products.truncate(first);
        Ok(products)
    }
}

/// A paid order with one line per `(name, quantity, line total)`.
pub fn simple_order(
    number: u64,
    currency: &str,
    shipping: Option<Decimal>,
    lines: &[(&str, i64, Decimal)],
) -> RemoteOrder {
    let money = |amount: Decimal| Money {
        amount,
        currency_code: currency.to_string(),
    };
    let items_total: Decimal = lines.iter().map(|(_, _, total)| *total).sum();
    let total = items_total + shipping.unwrap_or(Decimal::ZERO);
    RemoteOrder {
        id: format!("gid://shopify/Order/{number}"),
        name: format!("#{number}"),
        created_at: Some(chrono::Utc::now()),
        financial_status: Some("PAID".to_string()),
        fulfillment_status: Some("FULFILLED".to_string()),
        total_price: Some(money(total)),
        shipping_price: shipping.map(money),
        customer: None,
        line_items: lines
            .iter()
            .enumerate()
            .map(|(i, (name, quantity, line_total))| LineItem {
                id: format!("gid://shopify/LineItem/{number}{}", i + 1),
                name: name.to_string(),
                quantity: *quantity,
                sku: None,
                variant_title: None,
                image_url: None,
                discounted_total: Some(money(*line_total)),
            })
            .collect(),
    }
}
