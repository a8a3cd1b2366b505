//! Read-only views of commerce platform data. Fetched per request, never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::refund::DEFAULT_CURRENCY;

const ORDER_GID_PREFIX: &str = "gid://shopify/Order/";

/// Expands a bare numeric order id into the platform's global id.
/// `None` unless the id is all digits or already an order gid with a numeric tail.
pub fn order_gid(order_id: &str) -> Option<String> {
    let order_id = order_id.trim();
    let numeric = order_id.strip_prefix(ORDER_GID_PREFIX).unwrap_or(order_id);
    if numeric.is_empty() || !numeric.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{ORDER_GID_PREFIX}{numeric}"))
}

/// Last path segment of a global id, e.g. `123` for `gid://shopify/Order/123`.
pub fn legacy_id(gid: &str) -> &str {
    gid.rsplit('/').next().unwrap_or(gid)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub currency_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteCustomer {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl RemoteCustomer {
    pub fn label(&self) -> String {
        format!(
            "{} {} ({})",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or(""),
            self.email.as_deref().unwrap_or("")
        )
    }
}

/// List label for an order's customer; orders without one are guest checkouts.
pub fn customer_label(customer: Option<&RemoteCustomer>) -> String {
    customer
        .map(RemoteCustomer::label)
        .unwrap_or_else(|| "Guest".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub sku: Option<String>,
    pub variant_title: Option<String>,
    pub image_url: Option<String>,
    pub discounted_total: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteOrder {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub total_price: Option<Money>,
    pub shipping_price: Option<Money>,
    pub customer: Option<RemoteCustomer>,
    pub line_items: Vec<LineItem>,
}

impl RemoteOrder {
    /// Order total minus shipping; `None` when the order carries no total.
    pub fn refundable_amount(&self) -> Option<Decimal> {
        let total = self.total_price.as_ref()?.amount;
        let shipping = self
            .shipping_price
            .as_ref()
            .map(|m| m.amount)
            .unwrap_or(Decimal::ZERO);
        Some(total - shipping)
    }

    pub fn currency(&self) -> String {
        self.total_price
            .as_ref()
            .map(|m| m.currency_code.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            financial_status: self.financial_status.clone(),
            fulfillment_status: self.fulfillment_status.clone(),
            total: self.total_price.clone(),
            customer: customer_label(self.customer.as_ref()),
            line_items: self
                .line_items
                .iter()
                .map(|item| OrderLineSummary {
                    title: item.name.clone(),
                    quantity: item.quantity,
                    price: None,
                })
                .collect(),
        }
    }

    /// Every line item at its full quantity.
    pub fn full_refund_line_items(&self) -> Vec<RefundLineItem> {
        self.line_items
            .iter()
            .map(|item| RefundLineItem {
                line_item_id: item.id.clone(),
                quantity: item.quantity,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLineSummary {
    pub title: String,
    pub quantity: i64,
    pub price: Option<Decimal>,
}

/// One row of the recent orders list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub total: Option<Money>,
    pub customer: String,
    pub line_items: Vec<OrderLineSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundLineItem {
    pub line_item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedRefund {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserError {
    pub field: Vec<String>,
    pub message: String,
}

/// Result of a refund-create mutation: either a refund or the platform's validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundCreation {
    pub refund: Option<CreatedRefund>,
    pub user_errors: Vec<UserError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(cents: i64) -> Money {
        Money {
            amount: Decimal::new(cents, 2),
            currency_code: "CAD".into(),
        }
    }

    fn order(total: Option<Money>, shipping: Option<Money>) -> RemoteOrder {
        RemoteOrder {
            id: "gid://shopify/Order/1001".into(),
            name: "#1001".into(),
            created_at: None,
            financial_status: Some("PAID".into()),
            fulfillment_status: None,
            total_price: total,
            shipping_price: shipping,
            customer: None,
            line_items: vec![
                LineItem {
                    id: "gid://shopify/LineItem/1".into(),
                    name: "Mug".into(),
                    quantity: 2,
                    sku: None,
                    variant_title: None,
                    image_url: None,
                    discounted_total: Some(money(2000)),
                },
                LineItem {
                    id: "gid://shopify/LineItem/2".into(),
                    name: "Plate".into(),
                    quantity: 1,
                    sku: None,
                    variant_title: None,
                    image_url: None,
                    discounted_total: None,
                },
            ],
        }
    }

    #[test]
    fn refundable_amount_excludes_shipping() {
        let o = order(Some(money(5599)), Some(money(599)));
        assert_eq!(o.refundable_amount(), Some(Decimal::new(5000, 2)));
    }

    #[test]
    fn shipping_defaults_to_zero() {
        let o = order(Some(money(5599)), None);
        assert_eq!(o.refundable_amount(), Some(Decimal::new(5599, 2)));
    }

    #[test]
    fn missing_total_has_no_refundable_amount() {
        assert_eq!(order(None, Some(money(599))).refundable_amount(), None);
    }

    #[test]
    fn currency_comes_from_total() {
        assert_eq!(order(Some(money(1)), None).currency(), "CAD");
        assert_eq!(order(None, None).currency(), "USD");
    }

    #[test]
    fn full_refund_covers_every_line_at_full_quantity() {
        let items = order(Some(money(1)), None).full_refund_line_items();
        assert_eq!(
            items,
            vec![
                RefundLineItem {
                    line_item_id: "gid://shopify/LineItem/1".into(),
                    quantity: 2
                },
                RefundLineItem {
                    line_item_id: "gid://shopify/LineItem/2".into(),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn gid_helpers() {
        assert_eq!(order_gid("1001").as_deref(), Some("gid://shopify/Order/1001"));
        assert_eq!(
            order_gid(" gid://shopify/Order/5 ").as_deref(),
            Some("gid://shopify/Order/5")
        );
        assert_eq!(order_gid("abc"), None);
        assert_eq!(order_gid("12a"), None);
        assert_eq!(order_gid("gid://shopify/Order/"), None);
        assert_eq!(order_gid("gid://shopify/Product/5"), None);
        assert_eq!(legacy_id("gid://shopify/Order/5"), "5");
        assert_eq!(legacy_id("77"), "77");
    }

    #[test]
    fn customer_labels() {
        let c = RemoteCustomer {
            id: "gid://shopify/Customer/1".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            email: Some("ada@example.com".into()),
        };
        assert_eq!(c.label(), "Ada  (ada@example.com)");
        assert_eq!(customer_label(Some(&c)), "Ada  (ada@example.com)");
        assert_eq!(customer_label(None), "Guest");
    }

    #[test]
    fn summary_lists_line_titles() {
        let summary = order(Some(money(5599)), None).summary();
        assert_eq!(summary.customer, "Guest");
        assert_eq!(summary.line_items.len(), 2);
        assert_eq!(summary.line_items[0].title, "Mug");
        assert_eq!(summary.total, Some(money(5599)));
    }
}
