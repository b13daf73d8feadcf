//! StatusPoller processor.
//!
//! Client-triggered fallback for missed webhooks. Reading a deposit applies
//! lazy expiry, re-drives the ledger for confirmed but uncredited deposits,
//! and, on request, asks the provider for a fresh status.

use super::status_applier::StatusApplier;
use crate::entities::deposit::Deposit;
use crate::error::DepositError;
use crate::provider::PaymentProvider;
use crate::status_map::map_status;
use crate::store::Stores;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct StatusPoller {
    stores: Stores,
    provider: Arc<dyn PaymentProvider>,
    applier: StatusApplier,
}

impl StatusPoller {
    pub fn new(stores: Stores, provider: Arc<dyn PaymentProvider>, applier: StatusApplier) -> Self {
        Self {
            stores,
            provider,
            applier,
        }
    }

    /// Current state of a deposit owned by `user_id`.
    ///
    /// Deposits owned by someone else are reported as `NotFound`.
    #[tracing::instrument(skip(self), err)]
    pub async fn poll(
        &self,
        user_id: &str,
        deposit_id: Uuid,
        refresh: bool,
    ) -> Result<Deposit, DepositError> {
        let deposit = match self.stores.deposits.get_by_id(deposit_id).await? {
            Some(d) if d.user_id == user_id => d,
            Some(_) => {
                debug!("Deposit belongs to another user");
                return Err(DepositError::NotFound);
            }
            None => return Err(DepositError::NotFound),
        };

        let deposit = self
            .applier
            .expire_if_overdue(deposit, OffsetDateTime::now_utc())
            .await?;
        if deposit.status.is_terminal() {
            return Ok(deposit);
        }
        if deposit.status.triggers_credit() {
            debug!("Re-driving ledger for confirmed deposit");
            return Ok(self.applier.ledger().credit(&deposit).await?.into_deposit());
        }
        if !refresh {
            return Ok(deposit);
        }

        match self
            .provider
            .payment_status(&deposit.external_payment_id)
            .await
        {
            Ok(raw) => {
                let observed = map_status(&raw);
                debug!(raw_status = %raw, %observed, "Provider status refreshed");
                Ok(self.applier.observe(deposit, observed).await?.into_deposit())
            }
            Err(e) => {
                warn!(error = %e, "Provider status refresh failed; returning stored state");
                Ok(deposit)
            }
        }
    }

    /// The user's deposits, newest first, with lazy expiry applied.
    pub async fn history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Deposit>, DepositError> {
        let deposits = self
            .stores
            .deposits
            .list_by_user(user_id, limit, offset)
            .await?;
        let now = OffsetDateTime::now_utc();
        let mut out = Vec::with_capacity(deposits.len());
        for deposit in deposits {
            out.push(self.applier.expire_if_overdue(deposit, now).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DepositStatus;
    use crate::entities::deposit::DepositInsert;
    use crate::events::wallet_event_channel;
    use crate::processors::ledger::LedgerUpdater;
    use crate::provider::{PaymentSession, ProviderError, SessionRequest};
    use crate::store::{DepositStore, MemoryStore, WalletStore};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use time::Duration;

    /// Answers status queries from a fixed script.
    struct ScriptedProvider {
        answers: Mutex<Vec<Result<String, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                answers: Mutex::new(answers),
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn create_payment(&self, _: &SessionRequest) -> Result<PaymentSession, ProviderError> {
            unreachable!("poller never opens sessions")
        }

        async fn payment_status(&self, _: &str) -> Result<String, ProviderError> {
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn poller(store: &Arc<MemoryStore>, provider: ScriptedProvider) -> StatusPoller {
        let stores = Stores::memory(store.clone());
        let (tx, _) = wallet_event_channel();
        let ledger = LedgerUpdater::new(stores.clone(), tx.clone());
        let applier = StatusApplier::new(stores.clone(), ledger, tx);
        StatusPoller::new(stores, Arc::new(provider), applier)
    }

    async fn insert(store: &MemoryStore, user: &str, expires_in: Duration) -> Deposit {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::now_v7();
        store
            .insert(DepositInsert {
                id,
                user_id: user.into(),
                order_id: format!("deposit_{user}_{id}"),
                amount_usd: dec!(25),
                external_payment_id: id.to_string(),
                pay_currency_amount: dec!(0.0005),
                pay_address: "bc1q".into(),
                payment_url: None,
                is_demo: false,
                created_at: now,
                expires_at: now + expires_in,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_other_users_deposit_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let poller = poller(&store, ScriptedProvider::new(vec![]));
        let d = insert(&store, "owner", Duration::minutes(30)).await;
        assert!(matches!(
            poller.poll("intruder", d.id, true).await,
            Err(DepositError::NotFound)
        ));
        assert!(matches!(
            poller.poll("owner", Uuid::now_v7(), false).await,
            Err(DepositError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_refresh_follows_provider() {
        let store = Arc::new(MemoryStore::new());
        let poller = poller(
            &store,
            ScriptedProvider::new(vec![
                Ok("confirming".into()),
                Err(ProviderError::Unavailable("timeout".into())),
                Ok("finished".into()),
            ]),
        );
        let d = insert(&store, "u1", Duration::minutes(30)).await;

        assert_eq!(poller.poll("u1", d.id, false).await.unwrap().status, DepositStatus::Pending);
        assert_eq!(poller.poll("u1", d.id, true).await.unwrap().status, DepositStatus::Confirming);
        assert_eq!(poller.poll("u1", d.id, true).await.unwrap().status, DepositStatus::Confirming);
        assert_eq!(poller.poll("u1", d.id, true).await.unwrap().status, DepositStatus::Credited);
        // Terminal: the provider is not consulted again.
        assert_eq!(poller.poll("u1", d.id, true).await.unwrap().status, DepositStatus::Credited);
        assert_eq!(store.get_wallet("u1").await.unwrap().unwrap().balance, dec!(25));
    }

    #[tokio::test]
    async fn test_poll_redrives_confirmed_deposit() {
        let store = Arc::new(MemoryStore::new());
        let poller = poller(&store, ScriptedProvider::new(vec![]));
        let d = insert(&store, "u1", Duration::minutes(30)).await;
        store
            .update_status(d.id, DepositStatus::Pending, DepositStatus::Confirmed, OffsetDateTime::now_utc())
            .await
            .unwrap();

        let polled = poller.poll("u1", d.id, false).await.unwrap();
        assert_eq!(polled.status, DepositStatus::Credited);
        assert_eq!(store.get_wallet("u1").await.unwrap().unwrap().balance, dec!(25));
    }

    #[tokio::test]
    async fn test_history_applies_expiry() {
        let store = Arc::new(MemoryStore::new());
        let poller = poller(&store, ScriptedProvider::new(vec![]));
        insert(&store, "u1", Duration::seconds(-5)).await;
        insert(&store, "u1", Duration::minutes(30)).await;
        insert(&store, "u2", Duration::minutes(30)).await;

        let history = poller.history("u1", 50, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|d| d.status == DepositStatus::Expired));
        assert!(history.iter().any(|d| d.status == DepositStatus::Pending));
    }
}
