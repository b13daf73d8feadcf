//! PostgreSQL-backed stores on top of the entity processors.

use super::{DepositStore, StoreError, WalletStore};
use crate::entities::DepositStatus;
use crate::entities::deposit::{
    ClaimDepositCredit, CompareAndSetDepositStatus, CreditedTotal, Deposit, DepositInsert,
    GetCreditedTotal, GetDepositById, GetDepositByOrderId, GetDepositByPaymentId,
    InsertDeposit, ListCreditableDeposits, ListCreditedTotals, ListDeposits, ListUserDeposits,
};
use crate::entities::wallet::{ApplyWalletCredit, DebitWallet, GetOrCreateWallet, GetWallet, Wallet};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }

    pub fn processor(&self) -> &DatabaseProcessor {
        &self.db
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl DepositStore for PgStore {
    async fn insert(&self, insert: DepositInsert) -> Result<Deposit, StoreError> {
        self.db
            .process(InsertDeposit { insert })
            .await
            .map_err(map_insert_error)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Deposit>, StoreError> {
        Ok(self.db.process(GetDepositById { id }).await?)
    }

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Deposit>, StoreError> {
        Ok(self
            .db
            .process(GetDepositByOrderId {
                order_id: order_id.to_string(),
            })
            .await?)
    }

    async fn get_by_payment_id(&self, payment_id: &str) -> Result<Option<Deposit>, StoreError> {
        Ok(self
            .db
            .process(GetDepositByPaymentId {
                external_payment_id: payment_id.to_string(),
            })
            .await?)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Deposit>, StoreError> {
        Ok(self
            .db
            .process(ListUserDeposits {
                user_id: user_id.to_string(),
                limit,
                offset,
            })
            .await?)
    }

    async fn list(&self, filter: ListDeposits) -> Result<Vec<Deposit>, StoreError> {
        Ok(self.db.process(filter).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: DepositStatus,
        new_status: DepositStatus,
        at: OffsetDateTime,
    ) -> Result<Option<Deposit>, StoreError> {
        Ok(self
            .db
            .process(CompareAndSetDepositStatus {
                id,
                expected,
                new_status,
                at,
            })
            .await?)
    }

    async fn claim_credit(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<Option<Deposit>, StoreError> {
        Ok(self.db.process(ClaimDepositCredit { id, at }).await?)
    }

    async fn list_creditable(&self, limit: i64) -> Result<Vec<Deposit>, StoreError> {
        Ok(self.db.process(ListCreditableDeposits { limit }).await?)
    }

    async fn credited_total(&self, user_id: &str) -> Result<Decimal, StoreError> {
        Ok(self
            .db
            .process(GetCreditedTotal {
                user_id: user_id.to_string(),
            })
            .await?)
    }

    async fn credited_totals(&self) -> Result<Vec<CreditedTotal>, StoreError> {
        Ok(self.db.process(ListCreditedTotals).await?)
    }
}

#[async_trait]
impl WalletStore for PgStore {
    async fn get_wallet(&self, user_id: &str) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .db
            .process(GetWallet {
                user_id: user_id.to_string(),
            })
            .await?)
    }

    async fn get_or_create(&self, user_id: &str, at: OffsetDateTime) -> Result<Wallet, StoreError> {
        Ok(self
            .db
            .process(GetOrCreateWallet {
                user_id: user_id.to_string(),
                at,
            })
            .await?)
    }

    async fn apply_credit(
        &self,
        user_id: &str,
        expected_total: Decimal,
        delta: Decimal,
        at: OffsetDateTime,
    ) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .db
            .process(ApplyWalletCredit {
                user_id: user_id.to_string(),
                expected_total,
                delta,
                at,
            })
            .await?)
    }

    async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        at: OffsetDateTime,
    ) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .db
            .process(DebitWallet {
                user_id: user_id.to_string(),
                amount,
                at,
            })
            .await?)
    }
}
