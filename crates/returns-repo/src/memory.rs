use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use returns_types::domain::product::{Product, ProductInput};
use returns_types::domain::refund::Refund;
use returns_types::domain::return_request::{ReturnRequest, ReturnStatus, WorkflowState};
use returns_types::ports::returns_repository::{RepoError, ReturnsRepository};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct InMemoryRepo {
    pub requests: Arc<DashMap<Uuid, ReturnRequest>>,
    pub products: Arc<DashMap<String, Product>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            products: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReturnsRepository for InMemoryRepo {
    async fn create_return_request(
        &self,
        request: ReturnRequest,
    ) -> Result<ReturnRequest, RepoError> {
        self.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_return_request(&self, id: Uuid) -> Result<Option<ReturnRequest>, RepoError> {
        Ok(self.requests.get(&id).map(|r| r.clone()))
    }

    async fn list_return_requests(&self) -> Result<Vec<ReturnRequest>, RepoError> {
        let mut list: Vec<ReturnRequest> =
            self.requests.iter().map(|kv| kv.value().clone()).collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn update_return_status(
        &self,
        id: Uuid,
        status: ReturnStatus,
        refunded: bool,
    ) -> Result<Option<ReturnRequest>, RepoError> {
        if let Some(mut v) = self.requests.get_mut(&id) {
            v.update_status(status, refunded);
            return Ok(Some(v.clone()));
        }
        Ok(None)
    }

    async fn update_workflow_state(
        &self,
        id: Uuid,
        state: WorkflowState,
    ) -> Result<Option<ReturnRequest>, RepoError> {
        if let Some(mut v) = self.requests.get_mut(&id) {
            v.update_workflow_state(state);
            return Ok(Some(v.clone()));
        }
        Ok(None)
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError> {
        match self.requests.get_mut(&refund.return_request_id) {
            Some(mut owner) => {
                owner.refunds.push(refund.clone());
                Ok(refund)
            }
            None => Err(RepoError::DbError(format!(
                "return request {} not found",
                refund.return_request_id
            ))),
        }
    }

    async fn upsert_product(&self, input: ProductInput) -> Result<Product, RepoError> {
        match self.products.entry(input.shopify_id.clone()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().apply(input);
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                let product =
                    Product::from_input(input).map_err(|e| RepoError::DbError(e.to_string()))?;
                slot.insert(product.clone());
                Ok(product)
            }
        }
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        let mut list: Vec<Product> = self.products.iter().map(|kv| kv.value().clone()).collect();
        list.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.shopify_id.cmp(&b.shopify_id))
        });
        Ok(list)
    }
}
