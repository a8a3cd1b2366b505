use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Success,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Success => "success",
            RefundStatus::Failed => "failed",
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "success" => Ok(RefundStatus::Success),
            "failed" => Ok(RefundStatus::Failed),
            other => Err(format!("unknown refund status: {other}")),
        }
    }
}

/// Local mirror of a refund issued on the commerce platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Refund {
    pub id: Uuid,
    pub return_request_id: Uuid,
    pub shopify_refund_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: RefundStatus,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Refund {
    /// A refund the platform has already confirmed, processed now.
    pub fn success(
        return_request_id: Uuid,
        shopify_refund_id: String,
        amount: Decimal,
        currency: String,
    ) -> Self {
        let currency = if currency.trim().is_empty() {
            DEFAULT_CURRENCY.to_string()
        } else {
            currency
        };
        Self {
            id: Uuid::new_v4(),
            return_request_id,
            shopify_refund_id,
            amount,
            currency,
            status: RefundStatus::Success,
            processed_at: Some(Utc::now()),
        }
    }
}
