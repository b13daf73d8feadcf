//! LedgerUpdater processor.
//!
//! The LedgerUpdater is the only code that moves money into a wallet:
//! - Claiming a `confirmed|completed` deposit as `credited` (one winner)
//! - Settling the winner's wallet to the sum of its credited deposits
//! - Reading wallets (created lazily) and debiting them
//!
//! Settlement converges instead of adding blindly: it reads the wallet total
//! `T` and the credited sum `S`, and applies `S - T` with a write that only
//! succeeds while the total is still `T`. Running it twice is harmless, which
//! is what lets the reconciliation sweep repair a failed wallet write.

use crate::entities::deposit::Deposit;
use crate::entities::wallet::Wallet;
use crate::entities::DepositStatus;
use crate::error::DepositError;
use crate::events::{WalletEvent, WalletEventSender, publish};
use crate::store::Stores;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Attempts at the conditional wallet write before giving up with `Conflict`.
const MAX_SETTLE_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    /// This call won the claim. `wallet` is `None` when a concurrent
    /// settlement already carried the amount.
    Credited {
        deposit: Deposit,
        wallet: Option<Wallet>,
    },
    /// Somebody else credited it first.
    AlreadyCredited(Deposit),
    /// The deposit is not in a credit-triggering status.
    NotCreditable(Deposit),
}

impl CreditOutcome {
    pub fn into_deposit(self) -> Deposit {
        match self {
            CreditOutcome::Credited { deposit, .. } => deposit,
            CreditOutcome::AlreadyCredited(deposit) => deposit,
            CreditOutcome::NotCreditable(deposit) => deposit,
        }
    }
}

#[derive(Clone)]
pub struct LedgerUpdater {
    stores: Stores,
    events: WalletEventSender,
}

impl LedgerUpdater {
    pub fn new(stores: Stores, events: WalletEventSender) -> Self {
        Self { stores, events }
    }

    /// Credit a confirmed deposit exactly once.
    ///
    /// A wallet failure after a won claim is returned as an error; the
    /// deposit stays `credited` and the sweep settles the wallet later.
    pub async fn credit(&self, deposit: &Deposit) -> Result<CreditOutcome, DepositError> {
        let now = OffsetDateTime::now_utc();
        let Some(claimed) = self.stores.deposits.claim_credit(deposit.id, now).await? else {
            let current = self
                .stores
                .deposits
                .get_by_id(deposit.id)
                .await?
                .ok_or(DepositError::NotFound)?;
            return Ok(if current.status == DepositStatus::Credited {
                debug!(deposit_id = %current.id, "Deposit already credited");
                CreditOutcome::AlreadyCredited(current)
            } else {
                debug!(
                    deposit_id = %current.id,
                    status = %current.status,
                    "Deposit not creditable"
                );
                CreditOutcome::NotCreditable(current)
            });
        };

        info!(
            deposit_id = %claimed.id,
            user_id = %claimed.user_id,
            amount_usd = %claimed.amount_usd,
            "Deposit credited"
        );
        publish(&self.events, WalletEvent::deposit(&claimed));

        let wallet = match self.settle(&claimed.user_id).await {
            Ok(wallet) => wallet,
            // Concurrent settlers moved the wallet; whatever is left the sweep closes.
            Err(DepositError::Conflict) => {
                warn!(
                    deposit_id = %claimed.id,
                    user_id = %claimed.user_id,
                    "Wallet settlement contended after credit claim"
                );
                None
            }
            Err(e) => {
                error!(
                    deposit_id = %claimed.id,
                    user_id = %claimed.user_id,
                    error = %e,
                    "Wallet settlement failed after credit claim; left for the reconciliation sweep"
                );
                return Err(e);
            }
        };
        Ok(CreditOutcome::Credited {
            deposit: claimed,
            wallet,
        })
    }

    /// Bring `total_deposited` up to the user's credited sum.
    ///
    /// Returns the updated wallet when a delta was applied, `None` when the
    /// wallet was already settled.
    pub async fn settle(&self, user_id: &str) -> Result<Option<Wallet>, DepositError> {
        for attempt in 1..=MAX_SETTLE_ATTEMPTS {
            let wallet_total = self
                .stores
                .wallets
                .get_wallet(user_id)
                .await?
                .map(|w| w.total_deposited)
                .unwrap_or(Decimal::ZERO);
            let credited_total = self.stores.deposits.credited_total(user_id).await?;

            if credited_total <= wallet_total {
                if credited_total < wallet_total {
                    warn!(
                        user_id,
                        %credited_total,
                        %wallet_total,
                        "Wallet total exceeds credited deposits"
                    );
                }
                return Ok(None);
            }

            let delta = credited_total - wallet_total;
            let applied = self
                .stores
                .wallets
                .apply_credit(user_id, wallet_total, delta, OffsetDateTime::now_utc())
                .await?;
            match applied {
                Some(wallet) => {
                    info!(
                        user_id,
                        %delta,
                        balance = %wallet.balance,
                        total_deposited = %wallet.total_deposited,
                        "Wallet settled"
                    );
                    publish(&self.events, WalletEvent::balance(&wallet));
                    return Ok(Some(wallet));
                }
                None => {
                    debug!(user_id, attempt, "Wallet moved during settlement, retrying");
                }
            }
        }
        warn!(user_id, "Wallet settlement kept losing races");
        Err(DepositError::Conflict)
    }

    /// The user's wallet, created zeroed on first read.
    pub async fn wallet(&self, user_id: &str) -> Result<Wallet, DepositError> {
        Ok(self
            .stores
            .wallets
            .get_or_create(user_id, OffsetDateTime::now_utc())
            .await?)
    }

    /// Spend from the balance. Never drives it below zero.
    pub async fn debit(&self, user_id: &str, amount: Decimal) -> Result<Wallet, DepositError> {
        if amount <= Decimal::ZERO {
            return Err(DepositError::Validation(format!(
                "debit amount must be positive, got {amount}"
            )));
        }
        let now = OffsetDateTime::now_utc();
        match self.stores.wallets.debit(user_id, amount, now).await? {
            Some(wallet) => {
                info!(user_id, %amount, balance = %wallet.balance, "Wallet debited");
                publish(&self.events, WalletEvent::balance(&wallet));
                Ok(wallet)
            }
            None => {
                let wallet = self.stores.wallets.get_or_create(user_id, now).await?;
                debug!(user_id, %amount, balance = %wallet.balance, "Debit refused");
                Err(DepositError::InsufficientFunds {
                    balance: wallet.balance,
                    requested: amount,
                })
            }
        }
    }
}
