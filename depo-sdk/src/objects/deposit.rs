//! User API request and response types for deposits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DepositStatus;

/// Request body for opening a new deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDepositRequest {
    pub amount_usd: Decimal,
}

/// A deposit as returned to its owner.
///
/// Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositResponse {
    pub id: Uuid,
    pub order_id: String,
    pub amount_usd: Decimal,
    pub status: DepositStatus,
    pub external_payment_id: String,
    pub pay_currency_amount: Decimal,
    pub pay_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub confirmed_at: Option<i64>,
    pub credited_at: Option<i64>,
    /// True when the session was synthesized by the demo provider.
    #[serde(default)]
    pub is_demo: bool,
}

/// Query string for `GET /deposits/{id}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDepositQuery {
    /// Ask the provider for a fresh status when the deposit is still open.
    #[serde(default)]
    pub refresh: bool,
}

/// Query string for `GET /deposits`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositHistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
