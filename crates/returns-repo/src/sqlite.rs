use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use returns_types::domain::product::{Product, ProductInput};
use returns_types::domain::refund::Refund;
use returns_types::domain::return_request::{
    Receipt, ReturnRequest, ReturnStatus, WorkflowState,
};
use returns_types::ports::returns_repository::{RepoError, ReturnsRepository};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/0001_create_return_requests.sql"),
    include_str!("../migrations/0002_create_receipts.sql"),
    include_str!("../migrations/0003_create_refunds.sql"),
    include_str!("../migrations/0004_create_products.sql"),
];

const SELECT_REQUESTS: &str = "SELECT id, customer_id, order_id, reason, status, refunded, refund_amount, workflow_state, created_at, updated_at FROM return_requests";
const SELECT_REFUNDS: &str = "SELECT id, return_request_id, shopify_refund_id, amount, currency, status, processed_at FROM refunds";
const SELECT_RECEIPTS: &str =
    "SELECT id, return_request_id, file_url, created_at FROM receipts";
const SELECT_PRODUCTS: &str = "SELECT id, shopify_id, title, description, price, image_url, product_type, created_at, updated_at FROM products";

pub struct SqliteRepo {
    pool: SqlitePool,
}

fn db_err(e: impl std::fmt::Display) -> RepoError {
    RepoError::DbError(e.to_string())
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

fn parse_uuid(s: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(s).map_err(db_err)
}

fn parse_decimal(s: &str) -> Result<Decimal, RepoError> {
    Decimal::from_str(s).map_err(db_err)
}

/// Keeps the scale, so `40.00` reads back as `40.00`.
fn decimal_text(d: Decimal) -> String {
    d.to_string()
}

#[derive(FromRow)]
struct DbReturnRequest {
    id: String,
    customer_id: String,
    order_id: String,
    reason: String,
    status: String,
    refunded: bool,
    refund_amount: Option<String>,
    workflow_state: String,
    created_at: String,
    updated_at: String,
}

impl DbReturnRequest {
    fn into_return_request(
        self,
        receipts: Vec<Receipt>,
        refunds: Vec<Refund>,
    ) -> Result<ReturnRequest, RepoError> {
        Ok(ReturnRequest {
            id: parse_uuid(&self.id)?,
            customer_id: self.customer_id,
            order_id: self.order_id,
            reason: self.reason,
            status: ReturnStatus::from_str(&self.status).map_err(RepoError::DbError)?,
            refunded: self.refunded,
            refund_amount: self.refund_amount.as_deref().map(parse_decimal).transpose()?,
            workflow_state: WorkflowState::from_str(&self.workflow_state)
                .map_err(RepoError::DbError)?,
            receipts,
            refunds,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbRefund {
    id: String,
    return_request_id: String,
    shopify_refund_id: String,
    amount: String,
    currency: String,
    status: String,
    processed_at: Option<String>,
}

impl DbRefund {
    fn into_refund(self) -> Result<Refund, RepoError> {
        Ok(Refund {
            id: parse_uuid(&self.id)?,
            return_request_id: parse_uuid(&self.return_request_id)?,
            shopify_refund_id: self.shopify_refund_id,
            amount: parse_decimal(&self.amount)?,
            currency: self.currency,
            status: self.status.parse().map_err(RepoError::DbError)?,
            processed_at: self.processed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[derive(FromRow)]
struct DbReceipt {
    id: String,
    return_request_id: String,
    file_url: String,
    created_at: String,
}

impl DbReceipt {
    fn into_receipt(self) -> Result<Receipt, RepoError> {
        Ok(Receipt {
            id: parse_uuid(&self.id)?,
            return_request_id: parse_uuid(&self.return_request_id)?,
            file_url: self.file_url,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbProduct {
    id: String,
    shopify_id: String,
    title: String,
    description: Option<String>,
    price: Option<String>,
    image_url: Option<String>,
    product_type: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DbProduct {
    fn into_product(self) -> Result<Product, RepoError> {
        Ok(Product {
            id: parse_uuid(&self.id)?,
            shopify_id: self.shopify_id,
            title: self.title,
            description: self.description,
            price: self.price.as_deref().map(parse_decimal).transpose()?,
            image_url: self.image_url,
            product_type: self.product_type,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        for ddl in MIGRATIONS {
            sqlx::query(ddl).execute(&pool).await?;
        }
        tracing::debug!(url = database_url, "sqlite schema ready");

        Ok(Self { pool })
    }

    async fn children(
        &self,
        owner: Option<Uuid>,
    ) -> Result<(HashMap<Uuid, Vec<Receipt>>, HashMap<Uuid, Vec<Refund>>), RepoError> {
        let (receipt_rows, refund_rows): (Vec<DbReceipt>, Vec<DbRefund>) = match owner {
            Some(id) => {
                let receipts: Vec<DbReceipt> = sqlx::query_as(&format!(
                    "{SELECT_RECEIPTS} WHERE return_request_id = ? ORDER BY created_at, id"
                ))
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
                let refunds: Vec<DbRefund> = sqlx::query_as(&format!(
                    "{SELECT_REFUNDS} WHERE return_request_id = ? ORDER BY processed_at, id"
                ))
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
                (receipts, refunds)
            }
            None => {
                let receipts: Vec<DbReceipt> =
                    sqlx::query_as(&format!("{SELECT_RECEIPTS} ORDER BY created_at, id"))
                        .fetch_all(&self.pool)
                        .await
                        .map_err(db_err)?;
                let refunds: Vec<DbRefund> =
                    sqlx::query_as(&format!("{SELECT_REFUNDS} ORDER BY processed_at, id"))
                        .fetch_all(&self.pool)
                        .await
                        .map_err(db_err)?;
                (receipts, refunds)
            }
        };

        let mut receipts: HashMap<Uuid, Vec<Receipt>> = HashMap::new();
        for row in receipt_rows {
            let receipt = row.into_receipt()?;
            receipts
                .entry(receipt.return_request_id)
                .or_default()
                .push(receipt);
        }
        let mut refunds: HashMap<Uuid, Vec<Refund>> = HashMap::new();
        for row in refund_rows {
            let refund = row.into_refund()?;
            refunds
                .entry(refund.return_request_id)
                .or_default()
                .push(refund);
        }
        Ok((receipts, refunds))
    }
}

#[async_trait]
impl ReturnsRepository for SqliteRepo {
    async fn create_return_request(
        &self,
        request: ReturnRequest,
    ) -> Result<ReturnRequest, RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query(
            "INSERT INTO return_requests (id, customer_id, order_id, reason, status, refunded, refund_amount, workflow_state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(&request.customer_id)
        .bind(&request.order_id)
        .bind(&request.reason)
        .bind(request.status.as_str())
        .bind(request.refunded)
        .bind(request.refund_amount.map(decimal_text))
        .bind(request.workflow_state.to_string())
        .bind(ts(request.created_at))
        .bind(ts(request.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for receipt in &request.receipts {
            sqlx::query(
                "INSERT INTO receipts (id, return_request_id, file_url, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(receipt.id.to_string())
            .bind(request.id.to_string())
            .bind(&receipt.file_url)
            .bind(ts(receipt.created_at))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(request)
    }

    async fn get_return_request(&self, id: Uuid) -> Result<Option<ReturnRequest>, RepoError> {
        let row: Option<DbReturnRequest> =
            sqlx::query_as(&format!("{SELECT_REQUESTS} WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let (mut receipts, mut refunds) = self.children(Some(id)).await?;
        let request = row.into_return_request(
            receipts.remove(&id).unwrap_or_default(),
            refunds.remove(&id).unwrap_or_default(),
        )?;
        Ok(Some(request))
    }

    async fn list_return_requests(&self) -> Result<Vec<ReturnRequest>, RepoError> {
        let rows: Vec<DbReturnRequest> =
            sqlx::query_as(&format!("{SELECT_REQUESTS} ORDER BY created_at, id"))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        let (mut receipts, mut refunds) = self.children(None).await?;

        rows.into_iter()
            .map(|r| {
                let id = parse_uuid(&r.id)?;
                r.into_return_request(
                    receipts.remove(&id).unwrap_or_default(),
                    refunds.remove(&id).unwrap_or_default(),
                )
            })
            .collect::<Result<Vec<_>, _>>()
    }

    async fn update_return_status(
        &self,
        id: Uuid,
        status: ReturnStatus,
        refunded: bool,
    ) -> Result<Option<ReturnRequest>, RepoError> {
        let updated = sqlx::query(
            "UPDATE return_requests SET status = ?, refunded = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(refunded)
        .bind(ts(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_return_request(id).await
    }

    async fn update_workflow_state(
        &self,
        id: Uuid,
        state: WorkflowState,
    ) -> Result<Option<ReturnRequest>, RepoError> {
        let updated =
            sqlx::query("UPDATE return_requests SET workflow_state = ?, updated_at = ? WHERE id = ?")
                .bind(state.to_string())
                .bind(ts(Utc::now()))
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_return_request(id).await
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError> {
        sqlx::query(
            "INSERT INTO refunds (id, return_request_id, shopify_refund_id, amount, currency, status, processed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(refund.id.to_string())
        .bind(refund.return_request_id.to_string())
        .bind(&refund.shopify_refund_id)
        .bind(decimal_text(refund.amount))
        .bind(&refund.currency)
        .bind(refund.status.as_str())
        .bind(refund.processed_at.map(ts))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(refund)
    }

    async fn upsert_product(&self, input: ProductInput) -> Result<Product, RepoError> {
        let fresh = Product::from_input(input).map_err(db_err)?;
        // The WHERE clause keeps identical payloads from bumping updated_at.
        sqlx::query(
            "INSERT INTO products (id, shopify_id, title, description, price, image_url, product_type, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(shopify_id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 price = excluded.price,
                 image_url = excluded.image_url,
                 product_type = excluded.product_type,
                 updated_at = excluded.updated_at
             WHERE products.title IS NOT excluded.title
                OR products.description IS NOT excluded.description
                OR products.price IS NOT excluded.price
                OR products.image_url IS NOT excluded.image_url
                OR products.product_type IS NOT excluded.product_type",
        )
        .bind(fresh.id.to_string())
        .bind(&fresh.shopify_id)
        .bind(&fresh.title)
        .bind(&fresh.description)
        .bind(fresh.price.map(decimal_text))
        .bind(&fresh.image_url)
        .bind(&fresh.product_type)
        .bind(ts(fresh.created_at))
        .bind(ts(fresh.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row: DbProduct = sqlx::query_as(&format!("{SELECT_PRODUCTS} WHERE shopify_id = ?"))
            .bind(&fresh.shopify_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        row.into_product()
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<DbProduct> =
            sqlx::query_as(&format!("{SELECT_PRODUCTS} ORDER BY created_at, shopify_id"))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter()
            .map(|r| r.into_product())
            .collect::<Result<Vec<_>, _>>()
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("sqlite pool closed");
    }
}
