//! Admin API response shapes and their conversion into domain views.

use chrono::{DateTime, Utc};
use returns_types::domain::commerce::{
    customer_label, legacy_id, CreatedRefund, LineItem, Money, OrderLineSummary, OrderSummary,
    RemoteCustomer, RemoteOrder, UserError,
};
use returns_types::domain::product::ProductInput;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQLErrorResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Connection<T> {
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

impl<T> Connection<T> {
    pub fn into_nodes(self) -> impl Iterator<Item = T> {
        self.edges.into_iter().map(|e| e.node)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MoneyV2 {
    pub amount: String,
    pub currency_code: String,
}

impl MoneyV2 {
    /// `None` when the amount is not a decimal number.
    fn into_money(self) -> Option<Money> {
        let amount = Decimal::from_str(self.amount.trim()).ok()?;
        Some(Money {
            amount,
            currency_code: self.currency_code,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MoneyBag {
    pub shop_money: Option<MoneyV2>,
}

fn bag_money(bag: Option<MoneyBag>) -> Option<Money> {
    bag?.shop_money?.into_money()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCustomer {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl From<WireCustomer> for RemoteCustomer {
    fn from(c: WireCustomer) -> Self {
        RemoteCustomer {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireImage {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireVariant {
    pub title: Option<String>,
    pub price: Option<String>,
    pub image: Option<WireImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireLineItem {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub sku: Option<String>,
    pub variant: Option<WireVariant>,
    pub discounted_total_set: Option<MoneyBag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireShippingLine {
    pub discounted_price_set: Option<MoneyBag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireOrder {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub display_financial_status: Option<String>,
    pub display_fulfillment_status: Option<String>,
    pub total_price_set: Option<MoneyBag>,
    pub shipping_line: Option<WireShippingLine>,
    pub customer: Option<WireCustomer>,
    pub line_items: Option<Connection<WireLineItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderData {
    pub order: Option<WireOrder>,
}

pub(crate) fn convert_order(o: WireOrder) -> RemoteOrder {
    let line_items = o
        .line_items
        .map(|c| {
            c.into_nodes()
                .map(|item| {
                    let (variant_title, image_url) = match item.variant {
                        Some(v) => (v.title, v.image.map(|i| i.url)),
                        None => (None, None),
                    };
                    LineItem {
                        id: item.id,
                        name: item.name,
                        quantity: item.quantity,
                        sku: item.sku,
                        variant_title,
                        image_url,
                        discounted_total: bag_money(item.discounted_total_set),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    RemoteOrder {
        id: o.id,
        name: o.name,
        created_at: o.created_at,
        financial_status: o.display_financial_status,
        fulfillment_status: o.display_fulfillment_status,
        total_price: bag_money(o.total_price_set),
        shipping_price: o
            .shipping_line
            .and_then(|s| bag_money(s.discounted_price_set)),
        customer: o.customer.map(RemoteCustomer::from),
        line_items,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireLineSummary {
    pub title: String,
    pub quantity: i64,
    pub variant: Option<WireVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireOrderSummary {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub display_financial_status: Option<String>,
    pub display_fulfillment_status: Option<String>,
    pub total_price_set: Option<MoneyBag>,
    pub customer: Option<WireCustomer>,
    pub line_items: Option<Connection<WireLineSummary>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersData<T> {
    pub orders: Connection<T>,
}

pub(crate) fn convert_order_summary(o: WireOrderSummary) -> OrderSummary {
    let customer = o.customer.map(RemoteCustomer::from);
    OrderSummary {
        id: o.id,
        name: o.name,
        created_at: o.created_at,
        financial_status: o.display_financial_status,
        fulfillment_status: o.display_fulfillment_status,
        total: bag_money(o.total_price_set),
        customer: customer_label(customer.as_ref()),
        line_items: o
            .line_items
            .map(|c| {
                c.into_nodes()
                    .map(|item| OrderLineSummary {
                        title: item.title,
                        quantity: item.quantity,
                        price: item
                            .variant
                            .and_then(|v| v.price)
                            .and_then(|p| Decimal::from_str(&p).ok()),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUserError {
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl From<WireUserError> for UserError {
    fn from(e: WireUserError) -> Self {
        UserError {
            field: e.field.unwrap_or_default(),
            message: e.message,
        }
    }
}

/// `"field.path: message; ..."`, matching how the Admin UI reports them.
pub(crate) fn join_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| {
            if e.field.is_empty() {
                e.message.clone()
            } else {
                format!("{}: {}", e.field.join("."), e.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserErrorsPayload {
    #[serde(default)]
    pub user_errors: Vec<WireUserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TagsAddData {
    pub tags_add: Option<UserErrorsPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderUpdateData {
    pub order_update: Option<UserErrorsPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRefund {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefundCreatePayload {
    pub refund: Option<WireRefund>,
    #[serde(default)]
    pub user_errors: Vec<WireUserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefundCreateData {
    pub refund_create: Option<RefundCreatePayload>,
}

impl From<WireRefund> for CreatedRefund {
    fn from(r: WireRefund) -> Self {
        CreatedRefund {
            id: r.id,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PriceRange {
    pub min_variant_price: Option<MoneyV2>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireProduct {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub product_type: Option<String>,
    pub featured_image: Option<WireImage>,
    pub price_range_v2: Option<PriceRange>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductsData {
    pub products: Connection<WireProduct>,
}

/// Products are mirrored under their numeric id, the form staff see in order URLs.
pub(crate) fn convert_product(p: WireProduct) -> ProductInput {
    ProductInput {
        shopify_id: legacy_id(&p.id).to_string(),
        title: p.title,
        description: p.description.filter(|d| !d.is_empty()),
        price: p
            .price_range_v2
            .and_then(|r| r.min_variant_price)
            .and_then(MoneyV2::into_money)
            .map(|m| m.amount),
        image_url: p.featured_image.map(|i| i.url),
        product_type: p.product_type.filter(|t| !t.is_empty()),
    }
}
