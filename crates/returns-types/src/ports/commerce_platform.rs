use async_trait::async_trait;

use crate::domain::commerce::{OrderSummary, RefundCreation, RefundLineItem, RemoteOrder};
use crate::domain::product::ProductInput;

#[derive(thiserror::Error, Debug)]
pub enum PlatformError {
    #[error("http error: {0}")]
    Http(String),

    #[error("graphql errors: {}", .0.join("; "))]
    GraphQL(Vec<String>),

    #[error("user errors: {0}")]
    UserErrors(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Authenticated access to the remote commerce platform.
///
/// Order arguments are global ids (`gid://shopify/Order/<n>`).
#[async_trait]
pub trait CommercePlatform: Send + Sync + 'static {
    async fn fetch_order(&self, order_gid: &str) -> Result<Option<RemoteOrder>, PlatformError>;
    /// Most recent orders first.
    async fn list_orders(&self, first: i64) -> Result<Vec<OrderSummary>, PlatformError>;
    async fn count_orders(&self) -> Result<u64, PlatformError>;
    async fn add_order_tags(&self, order_gid: &str, tags: &[String]) -> Result<(), PlatformError>;
    async fn update_order_note(&self, order_gid: &str, note: &str) -> Result<(), PlatformError>;
    /// User errors are returned in the `RefundCreation`, not as `Err`.
    async fn create_refund(
        &self,
        order_gid: &str,
        note: &str,
        line_items: &[RefundLineItem],
    ) -> Result<RefundCreation, PlatformError>;
    async fn mark_order_refunded(&self, order_gid: &str, note: &str)
        -> Result<(), PlatformError>;
    async fn list_products(&self, first: i64) -> Result<Vec<ProductInput>, PlatformError>;
}
