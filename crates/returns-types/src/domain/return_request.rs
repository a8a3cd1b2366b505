use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::refund::{Refund, RefundStatus};

/// Reason codes offered to staff when filing a return. `reason` itself stays free text.
pub const RETURN_REASONS: &[(&str, &str)] = &[
    ("defective", "Defective product"),
    ("wrong_item", "Wrong item received"),
    ("not_as_described", "Item not as described"),
    ("changed_mind", "Changed mind"),
    ("size_issue", "Size doesn't fit"),
    ("quality_issues", "Quality issues"),
    ("other", "Other"),
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Refunded,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for ReturnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReturnStatus::Pending),
            "refunded" => Ok(ReturnStatus::Refunded),
            other => Err(format!("unknown return status: {other}")),
        }
    }
}

/// Workflow step that can leave a return request stranded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    IssueRefund,
    RecordRefund,
    MarkRefunded,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::IssueRefund => "issue_refund",
            WorkflowStep::RecordRefund => "record_refund",
            WorkflowStep::MarkRefunded => "mark_refunded",
        }
    }
}

/// Persisted progress of the return/refund saga for one request.
///
/// `Pending` means the local row exists and no refund has been confirmed yet.
/// A row still `Pending` long after creation is a crash artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum WorkflowState {
    Pending,
    RefundIssued,
    Completed,
    Failed(WorkflowStep),
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Pending => f.write_str("pending"),
            WorkflowState::RefundIssued => f.write_str("refund_issued"),
            WorkflowState::Completed => f.write_str("completed"),
            WorkflowState::Failed(step) => write!(f, "failed_at_{}", step.as_str()),
        }
    }
}

impl FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "pending" => WorkflowState::Pending,
            "refund_issued" => WorkflowState::RefundIssued,
            "completed" => WorkflowState::Completed,
            "failed_at_issue_refund" => WorkflowState::Failed(WorkflowStep::IssueRefund),
            "failed_at_record_refund" => WorkflowState::Failed(WorkflowStep::RecordRefund),
            "failed_at_mark_refunded" => WorkflowState::Failed(WorkflowStep::MarkRefunded),
            other => return Err(format!("unknown workflow state: {other}")),
        };
        Ok(state)
    }
}

impl From<WorkflowState> for String {
    fn from(state: WorkflowState) -> Self {
        state.to_string()
    }
}

impl TryFrom<String> for WorkflowState {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// File attached to a return request, e.g. a photo of the damaged goods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub id: Uuid,
    pub return_request_id: Uuid,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub customer_id: String,
    pub order_id: String,
    pub reason: String,
    pub status: ReturnStatus,
    pub refunded: bool,
    pub refund_amount: Option<Decimal>,
    pub workflow_state: WorkflowState,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReturnRequest {
    pub fn new(
        customer_id: String,
        order_id: String,
        reason: String,
        refund_amount: Decimal,
        receipt_urls: Vec<String>,
    ) -> anyhow::Result<Self> {
        if customer_id.trim().is_empty() {
            anyhow::bail!("customer_id empty");
        }
        if order_id.trim().is_empty() {
            anyhow::bail!("order_id empty");
        }
        if reason.trim().is_empty() {
            anyhow::bail!("reason empty");
        }
        if refund_amount.is_sign_negative() {
            anyhow::bail!("refund amount must not be negative");
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        let receipts = receipt_urls
            .into_iter()
            .filter(|url| !url.trim().is_empty())
            .map(|file_url| Receipt {
                id: Uuid::new_v4(),
                return_request_id: id,
                file_url,
                created_at: now,
            })
            .collect();
        Ok(Self {
            id,
            customer_id,
            order_id,
            reason,
            status: ReturnStatus::Pending,
            refunded: false,
            refund_amount: Some(refund_amount),
            workflow_state: WorkflowState::Pending,
            receipts,
            refunds: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_status(&mut self, status: ReturnStatus, refunded: bool) {
        self.status = status;
        self.refunded = refunded;
        self.updated_at = Utc::now();
    }

    pub fn update_workflow_state(&mut self, state: WorkflowState) {
        self.workflow_state = state;
        self.updated_at = Utc::now();
    }

    /// `refunded` must be backed by a successful refund and a recorded amount.
    pub fn refund_is_consistent(&self) -> bool {
        !self.refunded
            || (self.refund_amount.is_some()
                && self
                    .refunds
                    .iter()
                    .any(|r| r.status == RefundStatus::Success))
    }
}
