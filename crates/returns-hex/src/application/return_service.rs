use crate::application::analytics::{compute_analytics, AnalyticsReport};
use crate::errors::AppError;
use returns_types::domain::commerce::{
    legacy_id, order_gid, LineItem, OrderSummary, RemoteOrder, UserError,
};
use returns_types::domain::product::Product;
use returns_types::domain::refund::Refund;
use returns_types::domain::return_request::{
    ReturnRequest, ReturnStatus, WorkflowState, WorkflowStep, RETURN_REASONS,
};
use returns_types::ports::commerce_platform::CommercePlatform;
use returns_types::ports::returns_repository::ReturnsRepository;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

pub const RETURN_TAG: &str = "Return Requested";
pub const DEFAULT_ORDER_PAGE: i64 = 50;
pub const DEFAULT_PRODUCT_PAGE: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct NewReturn {
    pub customer_id: String,
    pub order_id: String,
    pub reason: String,
    #[serde(default)]
    pub receipts: Vec<String>,
}

/// A best-effort remote call that failed without aborting the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepWarning {
    pub step: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub return_request: ReturnRequest,
    pub refund: Refund,
    pub warnings: Vec<StepWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnPreview {
    pub order: OrderSummary,
    pub selected_items: Vec<LineItem>,
    pub total_refund_amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReturnReason {
    pub code: String,
    pub label: String,
}

fn internal(e: impl Into<anyhow::Error>) -> AppError {
    AppError::Internal(e.into())
}

fn join_messages(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct ReturnService<R, C>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    repo: R,
    platform: C,
}

impl<R, C> ReturnService<R, C>
where
    R: ReturnsRepository,
    C: CommercePlatform,
{
    pub fn new(repo: R, platform: C) -> Self {
        Self { repo, platform }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Runs the return/refund workflow for one order.
    ///
    /// Local state is written before any remote mutation, and the request's
    /// `workflow_state` records how far it got. Tagging, the order note and
    /// marking the order refunded are best effort: their failures come back
    /// as warnings on the outcome.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn submit_return(&self, input: NewReturn) -> Result<ReturnOutcome, AppError> {
        let NewReturn {
            customer_id,
            order_id,
            reason,
            receipts,
        } = input;
        let customer_id = customer_id.trim().to_string();
        let order_id = order_id.trim().to_string();
        let reason = reason.trim().to_string();
        if customer_id.is_empty() || order_id.is_empty() || reason.is_empty() {
            return Err(AppError::BadRequest(
                "customerId, orderId and reason are required".into(),
            ));
        }

        let gid = order_gid(&order_id)
            .ok_or_else(|| AppError::InvalidOrder("invalid order".into()))?;
        let order = self.platform.fetch_order(&gid).await.map_err(internal)?;
        let (order, refund_amount) = match order {
            Some(o) => match o.refundable_amount() {
                Some(amount) => (o, amount),
                None => return Err(AppError::InvalidOrder("invalid order".into())),
            },
            None => return Err(AppError::InvalidOrder("invalid order".into())),
        };
        let currency = order.currency();

        let request = ReturnRequest::new(
            customer_id,
            order_id,
            reason.clone(),
            refund_amount,
            receipts,
        )
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let request = self
            .repo
            .create_return_request(request)
            .await
            .map_err(internal)?;
        tracing::info!(return_id = %request.id, %refund_amount, %currency, "return request stored");

        let mut warnings = Vec::new();
        self.best_effort(
            &mut warnings,
            "add_tags",
            self.platform
                .add_order_tags(&gid, &[RETURN_TAG.to_string()])
                .await,
        );
        self.best_effort(
            &mut warnings,
            "update_note",
            self.platform
                .update_order_note(&gid, &format!("Return requested: {reason}"))
                .await,
        );

        let created = match self
            .platform
            .create_refund(
                &gid,
                &format!("Return: {reason}"),
                &order.full_refund_line_items(),
            )
            .await
        {
            Ok(created) => created,
            Err(e) => {
                self.mark_failed(request.id, WorkflowStep::IssueRefund).await;
                return Err(internal(e));
            }
        };
        if !created.user_errors.is_empty() {
            self.mark_failed(request.id, WorkflowStep::IssueRefund).await;
            return Err(AppError::RefundFailed(join_messages(&created.user_errors)));
        }
        let Some(remote_refund) = created.refund else {
            self.mark_failed(request.id, WorkflowStep::IssueRefund).await;
            return Err(AppError::RefundFailed("no refund created".into()));
        };
        tracing::info!(return_id = %request.id, refund_id = %remote_refund.id, "refund issued");

        let refund = match self.record_refund(&request, remote_refund.id, &currency).await {
            Ok(refund) => refund,
            Err(e) => {
                self.mark_failed(request.id, WorkflowStep::RecordRefund).await;
                return Err(e);
            }
        };

        let completed = match self.complete(request.id).await {
            Ok(updated) => updated,
            Err(e) => {
                self.mark_failed(request.id, WorkflowStep::MarkRefunded).await;
                return Err(e);
            }
        };

        let note = format!(
            "Refunded {} {} for return {}: {}",
            refund_amount, currency, completed.id, reason
        );
        self.best_effort(
            &mut warnings,
            "mark_refunded",
            self.platform.mark_order_refunded(&gid, &note).await,
        );

        Ok(ReturnOutcome {
            return_request: completed,
            refund,
            warnings,
        })
    }

    async fn record_refund(
        &self,
        request: &ReturnRequest,
        shopify_refund_id: String,
        currency: &str,
    ) -> Result<Refund, AppError> {
        self.set_state(request.id, WorkflowState::RefundIssued)
            .await?;
        let amount = request.refund_amount.unwrap_or(Decimal::ZERO);
        let refund = Refund::success(
            request.id,
            shopify_refund_id,
            amount,
            currency.to_string(),
        );
        self.repo.create_refund(refund).await.map_err(internal)
    }

    async fn complete(&self, id: Uuid) -> Result<ReturnRequest, AppError> {
        self.repo
            .update_return_status(id, ReturnStatus::Refunded, true)
            .await
            .map_err(internal)?
            .ok_or_else(|| internal(anyhow::anyhow!("return request {id} vanished")))?;
        self.set_state(id, WorkflowState::Completed).await
    }

    async fn set_state(&self, id: Uuid, state: WorkflowState) -> Result<ReturnRequest, AppError> {
        self.repo
            .update_workflow_state(id, state)
            .await
            .map_err(internal)?
            .ok_or_else(|| internal(anyhow::anyhow!("return request {id} vanished")))
    }

    /// Records the failed step; the caller's error wins over any error here.
    async fn mark_failed(&self, id: Uuid, step: WorkflowStep) {
        let state = WorkflowState::Failed(step);
        if let Err(e) = self.repo.update_workflow_state(id, state).await {
            tracing::error!(return_id = %id, %state, error = %e, "could not record workflow failure");
        }
    }

    fn best_effort<E: std::fmt::Display>(
        &self,
        warnings: &mut Vec<StepWarning>,
        step: &str,
        result: Result<(), E>,
    ) {
        if let Err(e) = result {
            tracing::warn!(step, error = %e, "best-effort step failed");
            warnings.push(StepWarning {
                step: step.to_string(),
                message: e.to_string(),
            });
        }
    }

    pub async fn list_returns(&self) -> Result<Vec<ReturnRequest>, AppError> {
        self.repo.list_return_requests().await.map_err(internal)
    }

    pub async fn get_return(&self, id: Uuid) -> Result<ReturnRequest, AppError> {
        match self.repo.get_return_request(id).await.map_err(internal)? {
            Some(r) => Ok(r),
            None => Err(AppError::NotFound(format!("return request {}", id))),
        }
    }

    pub fn return_reasons(&self) -> Vec<ReturnReason> {
        RETURN_REASONS
            .iter()
            .map(|(code, label)| ReturnReason {
                code: code.to_string(),
                label: label.to_string(),
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, first: Option<i64>) -> Result<Vec<OrderSummary>, AppError> {
        let first = first.unwrap_or(DEFAULT_ORDER_PAGE);
        if first <= 0 {
            return Err(AppError::BadRequest("first must be positive".into()));
        }
        self.platform.list_orders(first).await.map_err(internal)
    }

    /// What a return of the selected line items would refund. Items match on
    /// their global id or its numeric tail.
    #[instrument(skip(self))]
    pub async fn preview_return(
        &self,
        order_id: &str,
        item_ids: &[String],
    ) -> Result<ReturnPreview, AppError> {
        let wanted: Vec<&str> = item_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if wanted.is_empty() {
            return Err(AppError::BadRequest("No items selected for return".into()));
        }

        let gid =
            order_gid(order_id).ok_or_else(|| AppError::NotFound("Order not found".into()))?;
        let order: RemoteOrder = self
            .platform
            .fetch_order(&gid)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

        let selected_items: Vec<LineItem> = order
            .line_items
            .iter()
            .filter(|item| {
                wanted
                    .iter()
                    .any(|w| *w == item.id || *w == legacy_id(&item.id))
            })
            .cloned()
            .collect();
        let total_refund_amount = selected_items
            .iter()
            .filter_map(|item| item.discounted_total.as_ref().map(|m| m.amount))
            .sum();

        Ok(ReturnPreview {
            currency: order.currency(),
            order: order.summary(),
            selected_items,
            total_refund_amount,
        })
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        self.repo.list_products().await.map_err(internal)
    }

    /// Mirrors the platform catalog locally; returns how many products were upserted.
    #[instrument(skip(self))]
    pub async fn sync_products(&self, first: Option<i64>) -> Result<usize, AppError> {
        let first = first.unwrap_or(DEFAULT_PRODUCT_PAGE);
        if first <= 0 {
            return Err(AppError::BadRequest("first must be positive".into()));
        }
        let inputs = self.platform.list_products(first).await.map_err(internal)?;
        let mut synced = 0;
        for input in inputs {
            self.repo.upsert_product(input).await.map_err(internal)?;
            synced += 1;
        }
        tracing::info!(synced, "product catalog synced");
        Ok(synced)
    }

    #[instrument(skip(self))]
    pub async fn analytics(&self) -> Result<AnalyticsReport, AppError> {
        let requests = self.repo.list_return_requests().await.map_err(internal)?;
        let products = self.repo.list_products().await.map_err(internal)?;

        let mut warnings = Vec::new();
        let total_orders = match self.platform.count_orders().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "order count unavailable, return rate reported as 0");
                warnings.push(format!("order count unavailable: {e}"));
                0
            }
        };

        Ok(AnalyticsReport {
            summary: compute_analytics(&requests, &products, total_orders),
            total_orders,
            total_products: products.len(),
            return_requests: requests.len(),
            warnings,
        })
    }
}
