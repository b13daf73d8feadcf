use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub balance: Decimal,
    pub total_deposited: Decimal,
    pub updated_at: i64,
}

/// Request body for spending from the wallet (e.g. buying an ad slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitRequest {
    pub amount: Decimal,
    /// Free-form description of what the funds were spent on.
    #[serde(default)]
    pub memo: Option<String>,
}
