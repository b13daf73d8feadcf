//! Persistence ports for deposits and wallets.
//!
//! Both stores expose conditional writes so that concurrent webhook and
//! poll handlers never need an in-process lock:
//!
//! - [`DepositStore::update_status`] only moves a row still in the expected status.
//! - [`DepositStore::claim_credit`] is the single `confirmed|completed -> credited` claim.
//! - [`WalletStore::apply_credit`] only applies while `total_deposited` is unchanged.
//! - [`WalletStore::debit`] only applies while the balance covers the amount.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::entities::DepositStatus;
use crate::entities::deposit::{CreditedTotal, Deposit, DepositInsert, ListDeposits};
use crate::entities::wallet::Wallet;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DepositStore: Send + Sync {
    async fn insert(&self, insert: DepositInsert) -> Result<Deposit, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Deposit>, StoreError>;

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Deposit>, StoreError>;

    async fn get_by_payment_id(&self, payment_id: &str) -> Result<Option<Deposit>, StoreError>;

    /// Newest first.
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Deposit>, StoreError>;

    async fn list(&self, filter: ListDeposits) -> Result<Vec<Deposit>, StoreError>;

    /// Move the deposit to `new_status` only if it is still in `expected`.
    async fn update_status(
        &self,
        id: Uuid,
        expected: DepositStatus,
        new_status: DepositStatus,
        at: OffsetDateTime,
    ) -> Result<Option<Deposit>, StoreError>;

    /// `confirmed|completed -> credited`. `Some` for exactly one caller.
    async fn claim_credit(&self, id: Uuid, at: OffsetDateTime)
    -> Result<Option<Deposit>, StoreError>;

    /// Deposits in a credit-triggering status, oldest update first.
    async fn list_creditable(&self, limit: i64) -> Result<Vec<Deposit>, StoreError>;

    /// Sum of `amount_usd` over the user's credited deposits.
    async fn credited_total(&self, user_id: &str) -> Result<Decimal, StoreError>;

    async fn credited_totals(&self) -> Result<Vec<CreditedTotal>, StoreError>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_wallet(&self, user_id: &str) -> Result<Option<Wallet>, StoreError>;

    /// Read the wallet, creating a zeroed one if absent.
    async fn get_or_create(&self, user_id: &str, at: OffsetDateTime)
    -> Result<Wallet, StoreError>;

    /// Add `delta` to balance and total while `total_deposited == expected_total`.
    ///
    /// A missing wallet matches `expected_total == 0` and is created.
    /// `None` means the wallet changed underneath; re-read and retry.
    async fn apply_credit(
        &self,
        user_id: &str,
        expected_total: Decimal,
        delta: Decimal,
        at: OffsetDateTime,
    ) -> Result<Option<Wallet>, StoreError>;

    /// Subtract `amount` if the balance covers it. `None` otherwise.
    async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        at: OffsetDateTime,
    ) -> Result<Option<Wallet>, StoreError>;
}

/// The store handles the processors share.
#[derive(Clone)]
pub struct Stores {
    pub deposits: Arc<dyn DepositStore>,
    pub wallets: Arc<dyn WalletStore>,
}

impl Stores {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            deposits: store.clone(),
            wallets: store,
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            deposits: store.clone(),
            wallets: store,
        }
    }
}
