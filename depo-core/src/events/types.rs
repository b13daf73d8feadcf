//! Event type definitions.
//!
//! Events are ephemeral notifications for live subscribers. Losing one is
//! harmless: the stored deposit and wallet remain the source of truth.

use crate::entities::DepositStatus;
use crate::entities::deposit::Deposit;
use crate::entities::wallet::Wallet;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// A deposit's stored status changed.
    DepositStatusChanged {
        user_id: String,
        deposit_id: Uuid,
        status: DepositStatus,
    },
    /// A wallet's balance or total changed.
    BalanceChanged {
        user_id: String,
        balance: Decimal,
        total_deposited: Decimal,
    },
}

impl WalletEvent {
    pub fn deposit(deposit: &Deposit) -> Self {
        WalletEvent::DepositStatusChanged {
            user_id: deposit.user_id.clone(),
            deposit_id: deposit.id,
            status: deposit.status,
        }
    }

    pub fn balance(wallet: &Wallet) -> Self {
        WalletEvent::BalanceChanged {
            user_id: wallet.user_id.clone(),
            balance: wallet.balance,
            total_deposited: wallet.total_deposited,
        }
    }

    /// The user this event belongs to.
    pub fn user_id(&self) -> &str {
        match self {
            WalletEvent::DepositStatusChanged { user_id, .. } => user_id,
            WalletEvent::BalanceChanged { user_id, .. } => user_id,
        }
    }
}
