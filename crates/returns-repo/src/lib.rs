#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use async_trait::async_trait;
use returns_types::domain::product::{Product, ProductInput};
use returns_types::domain::refund::Refund;
use returns_types::domain::return_request::{ReturnRequest, ReturnStatus, WorkflowState};
use returns_types::ports::returns_repository::{RepoError, ReturnsRepository};
use uuid::Uuid;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://returns.db";

/// Backend chosen at build time. With `sqlite` enabled the database wins.
pub enum Repo {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteRepo),
}

pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Repo> {
    Repo::build_repo(url).await
}

impl Repo {
    #[cfg(not(feature = "sqlite"))]
    pub async fn build_repo(_: Option<&str>) -> anyhow::Result<Self> {
        tracing::info!("using in-memory returns repository");
        Ok(Repo::Memory(memory::InMemoryRepo::new()))
    }

    #[cfg(feature = "sqlite")]
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or(DEFAULT_DATABASE_URL);
        tracing::info!(url, "using sqlite returns repository");
        Ok(Repo::Sqlite(sqlite::SqliteRepo::new(url).await?))
    }
}

macro_rules! dispatch {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "memory")]
            Repo::Memory($repo) => $call,
            #[cfg(feature = "sqlite")]
            Repo::Sqlite($repo) => $call,
        }
    };
}

#[async_trait]
impl ReturnsRepository for Repo {
    async fn create_return_request(
        &self,
        request: ReturnRequest,
    ) -> Result<ReturnRequest, RepoError> {
        dispatch!(self, r => r.create_return_request(request).await)
    }

    async fn get_return_request(&self, id: Uuid) -> Result<Option<ReturnRequest>, RepoError> {
        dispatch!(self, r => r.get_return_request(id).await)
    }

    async fn list_return_requests(&self) -> Result<Vec<ReturnRequest>, RepoError> {
        dispatch!(self, r => r.list_return_requests().await)
    }

    async fn update_return_status(
        &self,
        id: Uuid,
        status: ReturnStatus,
        refunded: bool,
    ) -> Result<Option<ReturnRequest>, RepoError> {
        dispatch!(self, r => r.update_return_status(id, status, refunded).await)
    }

    async fn update_workflow_state(
        &self,
        id: Uuid,
        state: WorkflowState,
    ) -> Result<Option<ReturnRequest>, RepoError> {
        dispatch!(self, r => r.update_workflow_state(id, state).await)
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError> {
        dispatch!(self, r => r.create_refund(refund).await)
    }

    async fn upsert_product(&self, input: ProductInput) -> Result<Product, RepoError> {
        dispatch!(self, r => r.upsert_product(input).await)
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        dispatch!(self, r => r.list_products().await)
    }

    async fn close(&self) {
        dispatch!(self, r => r.close().await)
    }
}
