//! Admin API request and response types.

use serde::{Deserialize, Serialize};

use super::DepositStatus;
use super::deposit::DepositResponse;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Deposit detail for the admin API (includes the owner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDepositResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub deposit: DepositResponse,
    pub updated_at: i64,
}

/// Result of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReportResponse {
    /// Confirmed-but-uncredited deposits that were pushed through the ledger.
    pub redriven: u32,
    /// Wallets whose missing delta was re-applied.
    pub wallets_repaired: u32,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Query parameters for listing deposits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDepositsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<DepositStatus>,
    pub user_id: Option<String>,
}

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Clamp pagination parameters to sane bounds.
pub fn clamp_pagination(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_pagination() {
        assert_eq!(clamp_pagination(None, None), (50, 0));
        assert_eq!(clamp_pagination(Some(0), Some(-3)), (1, 0));
        assert_eq!(clamp_pagination(Some(10_000), Some(20)), (200, 20));
    }
}
