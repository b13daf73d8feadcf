//! Shared status transition path.
//!
//! The webhook receiver, the status poller and the demo auto-confirmation
//! all funnel provider observations through [`StatusApplier::observe`]:
//! lazy expiry, then the transition rules, then a conditional status write,
//! then the ledger if the new status triggers a credit.

use super::ledger::{CreditOutcome, LedgerUpdater};
use crate::entities::deposit::Deposit;
use crate::entities::{DepositStatus, Transition};
use crate::error::DepositError;
use crate::events::{WalletEvent, WalletEventSender, publish};
use crate::store::Stores;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Re-reads after a lost status write before giving up with `Conflict`.
const MAX_STATUS_ATTEMPTS: u32 = 8;

/// Result of feeding one provider observation into a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// The observed status was stored.
    Updated(Deposit),
    /// The observation credited the deposit.
    Credited(Deposit),
    /// Nothing to do: duplicate, out-of-order or conflicting with a terminal state.
    AlreadyUpToDate(Deposit),
}

impl ObservationOutcome {
    pub fn deposit(&self) -> &Deposit {
        match self {
            ObservationOutcome::Updated(d)
            | ObservationOutcome::Credited(d)
            | ObservationOutcome::AlreadyUpToDate(d) => d,
        }
    }

    pub fn into_deposit(self) -> Deposit {
        match self {
            ObservationOutcome::Updated(d)
            | ObservationOutcome::Credited(d)
            | ObservationOutcome::AlreadyUpToDate(d) => d,
        }
    }
}

#[derive(Debug)]
enum Applied {
    Stored(Deposit),
    Ignored(Deposit),
}

#[derive(Clone)]
pub struct StatusApplier {
    stores: Stores,
    ledger: LedgerUpdater,
    events: WalletEventSender,
}

impl StatusApplier {
    pub fn new(stores: Stores, ledger: LedgerUpdater, events: WalletEventSender) -> Self {
        Self {
            stores,
            ledger,
            events,
        }
    }

    pub fn ledger(&self) -> &LedgerUpdater {
        &self.ledger
    }

    async fn reload(&self, deposit: &Deposit) -> Result<Deposit, DepositError> {
        self.stores
            .deposits
            .get_by_id(deposit.id)
            .await?
            .ok_or(DepositError::NotFound)
    }

    /// Turn an overdue `pending`, `confirming` or `unknown` deposit into `expired`.
    ///
    /// If the write keeps losing to other writers the latest stored state is
    /// returned unchanged.
    pub async fn expire_if_overdue(
        &self,
        mut deposit: Deposit,
        now: OffsetDateTime,
    ) -> Result<Deposit, DepositError> {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            if !deposit.is_overdue(now) {
                return Ok(deposit);
            }
            let expired = self
                .stores
                .deposits
                .update_status(deposit.id, deposit.status, DepositStatus::Expired, now)
                .await?;
            match expired {
                Some(expired) => {
                    info!(deposit_id = %expired.id, "Deposit expired");
                    publish(&self.events, WalletEvent::deposit(&expired));
                    return Ok(expired);
                }
                None => deposit = self.reload(&deposit).await?,
            }
        }
        debug!(deposit_id = %deposit.id, "Expiry kept losing races; returning current state");
        Ok(deposit)
    }

    async fn apply(
        &self,
        mut deposit: Deposit,
        observed: DepositStatus,
    ) -> Result<Applied, DepositError> {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            match deposit.status.transition_to(observed) {
                Transition::Apply => {
                    let now = OffsetDateTime::now_utc();
                    let previous = deposit.status;
                    let stored = self
                        .stores
                        .deposits
                        .update_status(deposit.id, previous, observed, now)
                        .await?;
                    match stored {
                        Some(stored) => {
                            if previous != observed {
                                info!(
                                    deposit_id = %stored.id,
                                    from = %previous,
                                    to = %observed,
                                    "Deposit status updated"
                                );
                                publish(&self.events, WalletEvent::deposit(&stored));
                            }
                            return Ok(Applied::Stored(stored));
                        }
                        None => {
                            debug!(deposit_id = %deposit.id, "Deposit moved concurrently, re-reading");
                            deposit = self.reload(&deposit).await?;
                        }
                    }
                }
                Transition::Duplicate => {
                    debug!(
                        deposit_id = %deposit.id,
                        status = %deposit.status,
                        %observed,
                        "Duplicate status notification"
                    );
                    return Ok(Applied::Ignored(deposit));
                }
                Transition::Stale => {
                    debug!(
                        deposit_id = %deposit.id,
                        status = %deposit.status,
                        %observed,
                        "Ignoring out-of-order status for settled deposit"
                    );
                    return Ok(Applied::Ignored(deposit));
                }
                Transition::Anomaly => {
                    warn!(
                        deposit_id = %deposit.id,
                        status = %deposit.status,
                        %observed,
                        "Provider reported a conflicting outcome for a settled deposit; not applied"
                    );
                    return Ok(Applied::Ignored(deposit));
                }
            }
        }
        Err(DepositError::Conflict)
    }

    /// Apply one provider observation and credit if it calls for it.
    ///
    /// Losing every status write to concurrent writers is not an error: the
    /// deposit as it stands now is reported as already up to date.
    pub async fn observe(
        &self,
        deposit: Deposit,
        observed: DepositStatus,
    ) -> Result<ObservationOutcome, DepositError> {
        let id = deposit.id;
        match self.observe_once(deposit, observed).await {
            Err(DepositError::Conflict) => {
                warn!(deposit_id = %id, %observed, "Status write kept losing races; not applied");
                let current = self
                    .stores
                    .deposits
                    .get_by_id(id)
                    .await?
                    .ok_or(DepositError::NotFound)?;
                Ok(ObservationOutcome::AlreadyUpToDate(current))
            }
            other => other,
        }
    }

    async fn observe_once(
        &self,
        deposit: Deposit,
        observed: DepositStatus,
    ) -> Result<ObservationOutcome, DepositError> {
        let deposit = self
            .expire_if_overdue(deposit, OffsetDateTime::now_utc())
            .await?;
        let (deposit, stored) = match self.apply(deposit, observed).await? {
            Applied::Stored(deposit) => (deposit, true),
            Applied::Ignored(deposit) => (deposit, false),
        };
        if !(deposit.status.triggers_credit() && observed.triggers_credit()) {
            return Ok(if stored {
                ObservationOutcome::Updated(deposit)
            } else {
                ObservationOutcome::AlreadyUpToDate(deposit)
            });
        }
        // A repeated confirmation also retries a claim that failed earlier.
        Ok(match self.ledger.credit(&deposit).await? {
            CreditOutcome::Credited { deposit, .. } => ObservationOutcome::Credited(deposit),
            CreditOutcome::AlreadyCredited(deposit) => ObservationOutcome::AlreadyUpToDate(deposit),
            CreditOutcome::NotCreditable(deposit) if stored => ObservationOutcome::Updated(deposit),
            CreditOutcome::NotCreditable(deposit) => ObservationOutcome::AlreadyUpToDate(deposit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::deposit::DepositInsert;
    use crate::events::wallet_event_channel;
    use crate::store::{DepositStore, MemoryStore, WalletStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use time::Duration;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        applier: StatusApplier,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::memory(store.clone());
        let (tx, _) = wallet_event_channel();
        let ledger = LedgerUpdater::new(stores.clone(), tx.clone());
        Fixture {
            store,
            applier: StatusApplier::new(stores, ledger, tx),
        }
    }

    async fn pending(store: &MemoryStore, expires_in: Duration) -> Deposit {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::now_v7();
        store
            .insert(DepositInsert {
                id,
                user_id: "u1".into(),
                order_id: format!("deposit_u1_{id}"),
                amount_usd: dec!(50),
                external_payment_id: id.to_string(),
                pay_currency_amount: dec!(0.00111111),
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
    async fn test_walks_the_happy_path() {
        let f = fixture();
        let d = pending(&f.store, Duration::minutes(30)).await;

        let out = f.applier.observe(d, DepositStatus::Confirming).await.unwrap();
        assert!(matches!(out, ObservationOutcome::Updated(ref d) if d.status == DepositStatus::Confirming));

        let again = f
            .applier
            .observe(out.into_deposit(), DepositStatus::Confirming)
            .await
            .unwrap();
        assert!(matches!(again, ObservationOutcome::Updated(_)));

        let credited = f
            .applier
            .observe(again.into_deposit(), DepositStatus::Completed)
            .await
            .unwrap();
        assert!(matches!(credited, ObservationOutcome::Credited(ref d) if d.status == DepositStatus::Credited));
        assert_eq!(
            f.store.get_wallet("u1").await.unwrap().unwrap().balance,
            dec!(50)
        );
    }

    #[tokio::test]
    async fn test_terminal_deposits_ignore_late_news() {
        let f = fixture();
        let d = pending(&f.store, Duration::minutes(30)).await;
        let failed = f
            .applier
            .observe(d, DepositStatus::Failed)
            .await
            .unwrap()
            .into_deposit();
        assert_eq!(failed.status, DepositStatus::Failed);

        for late in [DepositStatus::Confirming, DepositStatus::Completed, DepositStatus::Expired] {
            let out = f.applier.observe(failed.clone(), late).await.unwrap();
            assert!(matches!(out, ObservationOutcome::AlreadyUpToDate(ref d) if d.status == DepositStatus::Failed));
        }
        assert!(f.store.get_wallet("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overdue_deposit_expires_before_observation() {
        let f = fixture();
        let d = pending(&f.store, Duration::seconds(-1)).await;
        let out = f.applier.observe(d, DepositStatus::Completed).await.unwrap();
        assert!(matches!(out, ObservationOutcome::AlreadyUpToDate(ref d) if d.status == DepositStatus::Expired));
        assert!(f.store.get_wallet("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_reloaded() {
        let f = fixture();
        let d = pending(&f.store, Duration::minutes(30)).await;
        f.store
            .update_status(
                d.id,
                DepositStatus::Pending,
                DepositStatus::Confirming,
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap();
        // `d` still says pending; the conditional write fails and the applier re-reads.
        let out = f.applier.observe(d, DepositStatus::Confirmed).await.unwrap();
        assert!(matches!(out, ObservationOutcome::Credited(_)));
    }

    #[tokio::test]
    async fn test_contended_status_write_is_a_noop() {
        let f = fixture();
        let d = pending(&f.store, Duration::minutes(30)).await;
        f.store.set_lose_status_writes(true);
        let out = f.applier.observe(d.clone(), DepositStatus::Confirming).await.unwrap();
        assert!(matches!(out, ObservationOutcome::AlreadyUpToDate(ref d) if d.status == DepositStatus::Pending));

        let overdue = pending(&f.store, Duration::seconds(-1)).await;
        let read = f
            .applier
            .expire_if_overdue(overdue, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(read.status, DepositStatus::Pending);
    }
}
