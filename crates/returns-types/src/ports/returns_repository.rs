use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::product::{Product, ProductInput};
use crate::domain::refund::Refund;
use crate::domain::return_request::{ReturnRequest, ReturnStatus, WorkflowState};

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("db error: {0}")]
    DbError(String),
}

/// Persistence gateway for return requests, refunds and the product mirror.
#[async_trait]
pub trait ReturnsRepository: Send + Sync + 'static {
    /// Stores the request together with its receipts.
    async fn create_return_request(&self, request: ReturnRequest)
        -> Result<ReturnRequest, RepoError>;
    async fn get_return_request(&self, id: Uuid) -> Result<Option<ReturnRequest>, RepoError>;
    /// All requests, oldest first, with receipts and refunds nested.
    async fn list_return_requests(&self) -> Result<Vec<ReturnRequest>, RepoError>;
    async fn update_return_status(
        &self,
        id: Uuid,
        status: ReturnStatus,
        refunded: bool,
    ) -> Result<Option<ReturnRequest>, RepoError>;
    async fn update_workflow_state(
        &self,
        id: Uuid,
        state: WorkflowState,
    ) -> Result<Option<ReturnRequest>, RepoError>;
    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError>;
    /// Insert or update keyed on `shopify_id`; identical payloads leave the row untouched.
    async fn upsert_product(&self, input: ProductInput) -> Result<Product, RepoError>;
    async fn list_products(&self) -> Result<Vec<Product>, RepoError>;

    /// Flush and release resources on shutdown.
    async fn close(&self) {}
}
