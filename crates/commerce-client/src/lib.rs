//! commerce-client: GraphQL Admin API adapter for the `CommercePlatform` port.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use returns_types::domain::commerce::{
    OrderSummary, RefundCreation, RefundLineItem, RemoteOrder, UserError,
};
use returns_types::domain::product::ProductInput;
use returns_types::ports::commerce_platform::{CommercePlatform, PlatformError};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use tracing::instrument;

#[cfg(feature = "memory")]
pub mod memory;
mod queries;
mod wire;

use wire::{
    convert_order, convert_order_summary, convert_product, join_user_errors, GraphQLResponse,
    OrderData, OrderUpdateData, OrdersData, ProductsData, RefundCreateData, TagsAddData,
    UserErrorsPayload, WireOrderSummary,
};

pub const DEFAULT_API_VERSION: &str = "2024-10";
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// `https://<store>/admin/api/<version>/graphql.json`
pub fn admin_endpoint(store: &str, api_version: &str) -> String {
    format!("https://{store}/admin/api/{api_version}/graphql.json")
}

#[derive(Clone)]
pub struct ShopifyClientBuilder {
    endpoint: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

#[derive(Clone)]
pub struct ShopifyClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl ShopifyClient {
    pub fn new(endpoint: &str, access_token: &str) -> anyhow::Result<Self> {
        Self::builder(endpoint)?
            .with_access_token(access_token)?
            .build()
    }

    pub fn builder(endpoint: &str) -> anyhow::Result<ShopifyClientBuilder> {
        let endpoint = Url::parse(endpoint).context("invalid admin api endpoint")?;
        Ok(ShopifyClientBuilder {
            endpoint,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, PlatformError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(PlatformError::RateLimited(retry_after));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(PlatformError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(PlatformError::Http(format!("unexpected status {status}")));
        }

        let body: GraphQLResponse<T> = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;

        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            return Err(PlatformError::GraphQL(
                errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        body.data
            .ok_or_else(|| PlatformError::GraphQL(vec!["No data in response".to_string()]))
    }
}

/// Mutations with nothing to return besides validation errors.
fn check_user_errors(payload: Option<UserErrorsPayload>) -> Result<(), PlatformError> {
    let errors: Vec<UserError> = payload
        .map(|p| p.user_errors.into_iter().map(UserError::from).collect())
        .unwrap_or_default();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PlatformError::UserErrors(join_user_errors(&errors)))
    }
}

#[async_trait]
impl CommercePlatform for ShopifyClient {
    #[instrument(skip(self))]
    async fn fetch_order(&self, order_gid: &str) -> Result<Option<RemoteOrder>, PlatformError> {
        let data: OrderData = self
            .execute(queries::GET_ORDER, json!({ "id": order_gid }))
            .await?;
        Ok(data.order.map(convert_order))
    }

    #[instrument(skip(self))]
    async fn list_orders(&self, first: i64) -> Result<Vec<OrderSummary>, PlatformError> {
        let data: OrdersData<WireOrderSummary> = self
            .execute(queries::LIST_ORDERS, json!({ "first": first }))
            .await?;
        Ok(data.orders.into_nodes().map(convert_order_summary).collect())
    }

    #[instrument(skip(self))]
    async fn count_orders(&self) -> Result<u64, PlatformError> {
        let data: OrdersData<IgnoredAny> =
            self.execute(queries::COUNT_ORDERS, json!({})).await?;
        Ok(data.orders.edges.len() as u64)
    }

    #[instrument(skip(self))]
    async fn add_order_tags(&self, order_gid: &str, tags: &[String]) -> Result<(), PlatformError> {
        let data: TagsAddData = self
            .execute(queries::TAGS_ADD, json!({ "id": order_gid, "tags": tags }))
            .await?;
        check_user_errors(data.tags_add)
    }

    #[instrument(skip(self, note))]
    async fn update_order_note(&self, order_gid: &str, note: &str) -> Result<(), PlatformError> {
        let data: OrderUpdateData = self
            .execute(
                queries::ORDER_UPDATE,
                json!({ "input": { "id": order_gid, "note": note } }),
            )
            .await?;
        check_user_errors(data.order_update)
    }

    #[instrument(skip(self, note, line_items), fields(lines = line_items.len()))]
    async fn create_refund(
        &self,
        order_gid: &str,
        note: &str,
        line_items: &[RefundLineItem],
    ) -> Result<RefundCreation, PlatformError> {
        let refund_line_items: Vec<serde_json::Value> = line_items
            .iter()
            .map(|li| json!({ "lineItemId": li.line_item_id, "quantity": li.quantity }))
            .collect();
        let variables = json!({
            "input": {
                "orderId": order_gid,
                "note": note,
                "notify": true,
                "refundLineItems": refund_line_items,
            }
        });
        let data: RefundCreateData = self.execute(queries::REFUND_CREATE, variables).await?;

        let Some(payload) = data.refund_create else {
            return Ok(RefundCreation::default());
        };
        Ok(RefundCreation {
            refund: payload.refund.map(Into::into),
            user_errors: payload.user_errors.into_iter().map(Into::into).collect(),
        })
    }

    /// The Admin API has no mutation for the financial status itself, so the
    /// order is annotated through `orderUpdate`.
    #[instrument(skip(self, note))]
    async fn mark_order_refunded(
        &self,
        order_gid: &str,
        note: &str,
    ) -> Result<(), PlatformError> {
        let data: OrderUpdateData = self
            .execute(
                queries::ORDER_UPDATE,
                json!({
                    "input": {
                        "id": order_gid,
                        "note": note,
                        "customAttributes": [
                            { "key": "financial_status", "value": "REFUNDED" }
                        ],
                    }
                }),
            )
            .await?;
        check_user_errors(data.order_update)
    }

    #[instrument(skip(self))]
    async fn list_products(&self, first: i64) -> Result<Vec<ProductInput>, PlatformError> {
        let data: ProductsData = self
            .execute(queries::LIST_PRODUCTS, json!({ "first": first }))
            .await?;
        Ok(data.products.into_nodes().map(convert_product).collect())
    }
}

impl ShopifyClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_access_token(self, token: impl AsRef<str>) -> anyhow::Result<Self> {
        let mut builder = self.with_header(ACCESS_TOKEN_HEADER, token)?;
        if let Some(value) = builder.headers.get_mut(ACCESS_TOKEN_HEADER) {
            value.set_sensitive(true);
        }
        Ok(builder)
    }

    /// A supplied client is used as is; headers and timeout are not applied to it.
    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<ShopifyClient> {
        if let Some(client) = self.client {
            return Ok(ShopifyClient {
                endpoint: self.endpoint,
                client,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(ShopifyClient {
            endpoint: self.endpoint,
            client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal::Decimal;

    const PATH: &str = "/admin/api/2024-10/graphql.json";

    fn client(server: &MockServer) -> ShopifyClient {
        ShopifyClient::new(&server.url(PATH), "shpat_test").unwrap()
    }

    #[test]
    fn endpoint_format() {
        assert_eq!(
            admin_endpoint("demo.myshopify.com", DEFAULT_API_VERSION),
            "https://demo.myshopify.com/admin/api/2024-10/graphql.json"
        );
    }

    #[tokio::test]
    async fn fetch_order_sends_token_and_maps_money() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(PATH)
                .header(ACCESS_TOKEN_HEADER, "shpat_test")
                .body_contains("getOrder")
                .body_contains("gid://shopify/Order/1001");
            then.status(200).json_body(serde_json::json!({
                "data": { "order": {
                    "id": "gid://shopify/Order/1001",
                    "name": "#1001",
                    "createdAt": "2024-03-01T10:00:00Z",
                    "displayFinancialStatus": "PAID",
                    "displayFulfillmentStatus": "FULFILLED",
                    "totalPriceSet": { "shopMoney": { "amount": "55.99", "currencyCode": "CAD" } },
                    "shippingLine": { "discountedPriceSet": { "shopMoney": { "amount": "5.99", "currencyCode": "CAD" } } },
                    "customer": { "id": "gid://shopify/Customer/7", "firstName": "Ada", "lastName": "Byron", "email": "ada@example.com" },
                    "lineItems": { "edges": [ { "node": {
                        "id": "gid://shopify/LineItem/1",
                        "name": "Mug",
                        "quantity": 2,
                        "sku": "MUG-1",
                        "variant": { "title": "Blue", "price": "25.00", "image": { "url": "https://cdn/mug.png" } },
                        "discountedTotalSet": { "shopMoney": { "amount": "50.00", "currencyCode": "CAD" } }
                    } } ] }
                } }
            }));
        });

        let order = client(&server)
            .fetch_order("gid://shopify/Order/1001")
            .await
            .unwrap()
            .expect("order present");
        mock.assert();

        assert_eq!(order.refundable_amount(), Some(Decimal::new(5000, 2)));
        assert_eq!(order.currency(), "CAD");
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_items[0].variant_title.as_deref(), Some("Blue"));
        assert_eq!(
            order.customer.as_ref().map(|c| c.label()).as_deref(),
            Some("Ada Byron (ada@example.com)")
        );
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200)
                .json_body(serde_json::json!({ "data": { "order": null } }));
        });
        let order = client(&server).fetch_order("gid://shopify/Order/9").await;
        assert!(matches!(order, Ok(None)));
    }

    #[tokio::test]
    async fn list_orders_labels_guests() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH).body_contains("listOrders");
            then.status(200).json_body(serde_json::json!({
                "data": { "orders": { "edges": [
                    { "node": {
                        "id": "gid://shopify/Order/2",
                        "name": "#1002",
                        "createdAt": null,
                        "displayFinancialStatus": "PAID",
                        "displayFulfillmentStatus": null,
                        "totalPriceSet": { "shopMoney": { "amount": "10.00", "currencyCode": "USD" } },
                        "customer": null,
                        "lineItems": { "edges": [ { "node": { "title": "Cap", "quantity": 1, "variant": { "price": "10.00" } } } ] }
                    } }
                ] } }
            }));
        });

        let orders = client(&server).list_orders(50).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].customer, "Guest");
        assert_eq!(orders[0].line_items[0].price, Some(Decimal::new(1000, 2)));
    }

    #[tokio::test]
    async fn count_orders_counts_edges() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH).body_contains("countOrders");
            then.status(200).json_body(serde_json::json!({
                "data": { "orders": { "edges": [
                    { "node": { "id": "gid://shopify/Order/1" } },
                    { "node": { "id": "gid://shopify/Order/2" } },
                    { "node": { "id": "gid://shopify/Order/3" } }
                ] } }
            }));
        });
        assert_eq!(client(&server).count_orders().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn refund_create_sends_every_line_item() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(PATH)
                .body_contains("refundCreate")
                .body_contains("\"lineItemId\":\"gid://shopify/LineItem/1\"")
                .body_contains("\"notify\":true");
            then.status(200).json_body(serde_json::json!({
                "data": { "refundCreate": {
                    "refund": { "id": "gid://shopify/Refund/55", "createdAt": "2024-03-02T00:00:00Z" },
                    "userErrors": []
                } }
            }));
        });

        let created = client(&server)
            .create_refund(
                "gid://shopify/Order/1001",
                "Return: defective",
                &[RefundLineItem {
                    line_item_id: "gid://shopify/LineItem/1".into(),
                    quantity: 2,
                }],
            )
            .await
            .unwrap();
        mock.assert();
        assert_eq!(
            created.refund.map(|r| r.id).as_deref(),
            Some("gid://shopify/Refund/55")
        );
        assert!(created.user_errors.is_empty());
    }

    #[tokio::test]
    async fn refund_user_errors_are_returned_not_raised() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200).json_body(serde_json::json!({
                "data": { "refundCreate": {
                    "refund": null,
                    "userErrors": [ { "field": ["refundLineItems", "0"], "message": "Quantity too high" } ]
                } }
            }));
        });

        let created = client(&server)
            .create_refund("gid://shopify/Order/1", "n", &[])
            .await
            .unwrap();
        assert!(created.refund.is_none());
        assert_eq!(created.user_errors.len(), 1);
        assert_eq!(created.user_errors[0].field, vec!["refundLineItems", "0"]);
    }

    #[tokio::test]
    async fn mutation_user_errors_map_to_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH).body_contains("tagsAdd");
            then.status(200).json_body(serde_json::json!({
                "data": { "tagsAdd": { "userErrors": [
                    { "field": ["id"], "message": "Order does not exist" },
                    { "field": null, "message": "Try again" }
                ] } }
            }));
        });

        let err = client(&server)
            .add_order_tags("gid://shopify/Order/1", &["Return Requested".to_string()])
            .await
            .unwrap_err();
        match err {
            PlatformError::UserErrors(msg) => {
                assert_eq!(msg, "id: Order does not exist; Try again")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mark_refunded_sets_custom_attribute() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(PATH)
                .body_contains("orderUpdate")
                .body_contains("REFUNDED");
            then.status(200).json_body(serde_json::json!({
                "data": { "orderUpdate": { "order": { "id": "gid://shopify/Order/1" }, "userErrors": [] } }
            }));
        });

        client(&server)
            .mark_order_refunded("gid://shopify/Order/1", "Refunded 10 USD")
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(429).header("Retry-After", "7");
        });
        let err = client(&server).count_orders().await.unwrap_err();
        assert!(matches!(err, PlatformError::RateLimited(7)));
    }

    #[tokio::test]
    async fn rate_limit_defaults_to_a_minute() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(429);
        });
        let err = client(&server).count_orders().await.unwrap_err();
        assert!(matches!(err, PlatformError::RateLimited(60)));
    }

    #[tokio::test]
    async fn unauthorized_and_server_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(401);
        });
        let err = client(&server).count_orders().await.unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized(_)));

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(502).body("bad gateway");
        });
        let err = client(&server).count_orders().await.unwrap_err();
        assert!(matches!(err, PlatformError::Http(_)));
    }

    #[tokio::test]
    async fn graphql_errors_and_missing_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200).json_body(serde_json::json!({
                "errors": [ { "message": "Throttled" }, { "message": "Field missing" } ]
            }));
        });
        match client(&server).list_products(10).await.unwrap_err() {
            PlatformError::GraphQL(msgs) => assert_eq!(msgs, vec!["Throttled", "Field missing"]),
            other => panic!("unexpected error: {other:?}"),
        }

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200).json_body(serde_json::json!({ "data": null }));
        });
        match client(&server).list_products(10).await.unwrap_err() {
            PlatformError::GraphQL(msgs) => assert_eq!(msgs, vec!["No data in response"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200).body("<html>maintenance</html>");
        });
        let err = client(&server).count_orders().await.unwrap_err();
        assert!(matches!(err, PlatformError::Decode(_)));
    }

    #[tokio::test]
    async fn products_use_numeric_ids() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH).body_contains("listProducts");
            then.status(200).json_body(serde_json::json!({
                "data": { "products": { "edges": [ { "node": {
                    "id": "gid://shopify/Product/8841",
                    "title": "Mug",
                    "description": "",
                    "productType": "Kitchen",
                    "featuredImage": null,
                    "priceRangeV2": { "minVariantPrice": { "amount": "12.50", "currencyCode": "USD" } }
                } } ] } }
            }));
        });

        let products = client(&server).list_products(50).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].shopify_id, "8841");
        assert_eq!(products[0].description, None);
        assert_eq!(products[0].product_type.as_deref(), Some("Kitchen"));
        assert_eq!(products[0].price, Some(Decimal::new(1250, 2)));
    }
}
