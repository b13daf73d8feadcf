//! Provider status vocabulary to [`DepositStatus`].
//!
//! Each provider gets a static table. Anything not in the table is
//! [`DepositStatus::Unknown`], which never triggers a credit.

use crate::entities::DepositStatus;

/// A static lookup table for one provider's status strings.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    pub provider: &'static str,
    entries: &'static [(&'static str, DepositStatus)],
}

impl StatusTable {
    pub const fn new(
        provider: &'static str,
        entries: &'static [(&'static str, DepositStatus)],
    ) -> Self {
        Self { provider, entries }
    }

    /// Exact, case-sensitive match.
    pub fn map(&self, raw: &str) -> DepositStatus {
        self.entries
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, status)| *status)
            .unwrap_or(DepositStatus::Unknown)
    }
}

pub const NOWPAYMENTS: StatusTable = StatusTable::new(
    "nowpayments",
    &[
        ("waiting", DepositStatus::Pending),
        ("confirming", DepositStatus::Confirming),
        ("confirmed", DepositStatus::Confirmed),
        ("finished", DepositStatus::Completed),
        ("failed", DepositStatus::Failed),
        ("expired", DepositStatus::Expired),
    ],
);

/// Map a NowPayments `payment_status`.
pub fn map_status(raw: &str) -> DepositStatus {
    NOWPAYMENTS.map(raw)
}
