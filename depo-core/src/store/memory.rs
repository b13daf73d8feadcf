//! In-process store for tests and database-less demo deployments.
//!
//! Every operation runs inside a single write (or read) critical section, so
//! the conditional writes have the same semantics as their SQL counterparts.

use super::{DepositStore, StoreError, WalletStore};
use crate::entities::DepositStatus;
use crate::entities::deposit::{CreditedTotal, Deposit, DepositInsert, ListDeposits};
use crate::entities::wallet::Wallet;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    deposits: HashMap<Uuid, Deposit>,
    by_order_id: HashMap<String, Uuid>,
    by_payment_id: HashMap<String, Uuid>,
    wallets: HashMap<String, Wallet>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_wallet_writes: AtomicBool,
    fail_credit_claims: AtomicBool,
    lose_status_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make wallet credits and debits fail with [`StoreError::Unavailable`].
    pub fn set_fail_wallet_writes(&self, fail: bool) {
        self.fail_wallet_writes.store(fail, Ordering::SeqCst);
    }

    /// Make credit claims fail with [`StoreError::Unavailable`].
    pub fn set_fail_credit_claims(&self, fail: bool) {
        self.fail_credit_claims.store(fail, Ordering::SeqCst);
    }

    /// Make every status write report a concurrent change, as if another
    /// writer always got there first.
    pub fn set_lose_status_writes(&self, lose: bool) {
        self.lose_status_writes.store(lose, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{what} disabled")));
        }
        Ok(())
    }
}

fn newest_first(deposits: &mut [Deposit]) {
    deposits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn page(deposits: Vec<Deposit>, limit: i64, offset: i64) -> Vec<Deposit> {
    deposits
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl DepositStore for MemoryStore {
    async fn insert(&self, insert: DepositInsert) -> Result<Deposit, StoreError> {
        let mut state = self.state.write().await;
        if state.by_order_id.contains_key(&insert.order_id) {
            return Err(StoreError::Duplicate("deposits_order_id_key".into()));
        }
        if state.by_payment_id.contains_key(&insert.external_payment_id) {
            return Err(StoreError::Duplicate(
                "deposits_external_payment_id_key".into(),
            ));
        }
        let deposit = insert.into_deposit();
        state
            .by_order_id
            .insert(deposit.order_id.clone(), deposit.id);
        state
            .by_payment_id
            .insert(deposit.external_payment_id.clone(), deposit.id);
        state.deposits.insert(deposit.id, deposit.clone());
        Ok(deposit)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Deposit>, StoreError> {
        Ok(self.state.read().await.deposits.get(&id).cloned())
    }

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<Deposit>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .by_order_id
            .get(order_id)
            .and_then(|id| state.deposits.get(id))
            .cloned())
    }

    async fn get_by_payment_id(&self, payment_id: &str) -> Result<Option<Deposit>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .by_payment_id
            .get(payment_id)
            .and_then(|id| state.deposits.get(id))
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Deposit>, StoreError> {
        let state = self.state.read().await;
        let mut deposits: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut deposits);
        Ok(page(deposits, limit, offset))
    }

    async fn list(&self, filter: ListDeposits) -> Result<Vec<Deposit>, StoreError> {
        let state = self.state.read().await;
        let mut deposits: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .filter(|d| filter.user_id.as_deref().is_none_or(|u| d.user_id == u))
            .cloned()
            .collect();
        newest_first(&mut deposits);
        Ok(page(deposits, filter.limit, filter.offset))
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: DepositStatus,
        new_status: DepositStatus,
        at: OffsetDateTime,
    ) -> Result<Option<Deposit>, StoreError> {
        if self.lose_status_writes.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut state = self.state.write().await;
        let Some(deposit) = state.deposits.get_mut(&id) else {
            return Ok(None);
        };
        if deposit.status != expected {
            return Ok(None);
        }
        deposit.status = new_status;
        deposit.updated_at = at;
        if new_status.triggers_credit() && deposit.confirmed_at.is_none() {
            deposit.confirmed_at = Some(at);
        }
        Ok(Some(deposit.clone()))
    }

    async fn claim_credit(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<Option<Deposit>, StoreError> {
        Self::check(&self.fail_credit_claims, "credit claims")?;
        let mut state = self.state.write().await;
        let Some(deposit) = state.deposits.get_mut(&id) else {
            return Ok(None);
        };
        if !deposit.status.triggers_credit() {
            return Ok(None);
        }
        deposit.status = DepositStatus::Credited;
        deposit.credited_at = Some(at);
        deposit.updated_at = at;
        deposit.confirmed_at.get_or_insert(at);
        Ok(Some(deposit.clone()))
    }

    async fn list_creditable(&self, limit: i64) -> Result<Vec<Deposit>, StoreError> {
        let state = self.state.read().await;
        let mut deposits: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| d.status.triggers_credit())
            .cloned()
            .collect();
        deposits.sort_by_key(|d| d.updated_at);
        Ok(page(deposits, limit, 0))
    }

    async fn credited_total(&self, user_id: &str) -> Result<Decimal, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .deposits
            .values()
            .filter(|d| d.user_id == user_id && d.status == DepositStatus::Credited)
            .map(|d| d.amount_usd)
            .sum())
    }

    async fn credited_totals(&self) -> Result<Vec<CreditedTotal>, StoreError> {
        let state = self.state.read().await;
        let mut totals: HashMap<&str, Decimal> = HashMap::new();
        for d in state
            .deposits
            .values()
            .filter(|d| d.status == DepositStatus::Credited)
        {
            *totals.entry(d.user_id.as_str()).or_default() += d.amount_usd;
        }
        Ok(totals
            .into_iter()
            .map(|(user_id, total)| CreditedTotal {
                user_id: user_id.to_string(),
                total,
            })
            .collect())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn get_wallet(&self, user_id: &str) -> Result<Option<Wallet>, StoreError> {
        Ok(self.state.read().await.wallets.get(user_id).cloned())
    }

    async fn get_or_create(&self, user_id: &str, at: OffsetDateTime) -> Result<Wallet, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::empty(user_id, at))
            .clone())
    }

    async fn apply_credit(
        &self,
        user_id: &str,
        expected_total: Decimal,
        delta: Decimal,
        at: OffsetDateTime,
    ) -> Result<Option<Wallet>, StoreError> {
        Self::check(&self.fail_wallet_writes, "wallet writes")?;
        let mut state = self.state.write().await;
        match state.wallets.get_mut(user_id) {
            Some(wallet) if wallet.total_deposited == expected_total => {
                wallet.balance += delta;
                wallet.total_deposited += delta;
                wallet.updated_at = at;
                Ok(Some(wallet.clone()))
            }
            Some(_) => Ok(None),
            None if expected_total.is_zero() => {
                let mut wallet = Wallet::empty(user_id, at);
                wallet.balance = delta;
                wallet.total_deposited = delta;
                state.wallets.insert(user_id.to_string(), wallet.clone());
                Ok(Some(wallet))
            }
            None => Ok(None),
        }
    }

    async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        at: OffsetDateTime,
    ) -> Result<Option<Wallet>, StoreError> {
        Self::check(&self.fail_wallet_writes, "wallet writes")?;
        let mut state = self.state.write().await;
        match state.wallets.get_mut(user_id) {
            Some(wallet) if wallet.balance >= amount => {
                wallet.balance -= amount;
                wallet.updated_at = at;
                Ok(Some(wallet.clone()))
            }
            _ => Ok(None),
        }
    }
}
