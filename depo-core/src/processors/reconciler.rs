//! Reconciler processor.
//!
//! The Reconciler closes the gaps a crash or a store outage can leave
//! between the deposit table and the wallets:
//! - Deposits stuck in `confirmed`/`completed` are pushed through the ledger
//! - Users whose credited sum exceeds `total_deposited` get the missing delta
//!
//! A sweep runs periodically (interval from a watched [`ConfigStore`]) and
//! can be triggered on demand from the admin API.

use super::ledger::{CreditOutcome, LedgerUpdater};
use crate::config::{ConfigStore, ReconcilerConfig};
use crate::error::DepositError;
use crate::store::Stores;
use depo_sdk::objects::admin::SweepReportResponse;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Upper bound on stuck deposits re-driven per sweep.
const SWEEP_BATCH: i64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub redriven: u32,
    pub wallets_repaired: u32,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.redriven == 0 && self.wallets_repaired == 0
    }
}

impl From<SweepReport> for SweepReportResponse {
    fn from(r: SweepReport) -> Self {
        SweepReportResponse {
            redriven: r.redriven,
            wallets_repaired: r.wallets_repaired,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    stores: Stores,
    ledger: LedgerUpdater,
}

impl Reconciler {
    pub fn new(stores: Stores, ledger: LedgerUpdater) -> Self {
        Self { stores, ledger }
    }

    /// One pass over stuck deposits and drifted wallets.
    ///
    /// Per-item failures are logged and skipped; only failing to list the
    /// work aborts the sweep.
    pub async fn sweep(&self) -> Result<SweepReport, DepositError> {
        let mut report = SweepReport::default();

        for deposit in self.stores.deposits.list_creditable(SWEEP_BATCH).await? {
            match self.ledger.credit(&deposit).await {
                Ok(CreditOutcome::Credited { .. }) => report.redriven += 1,
                Ok(_) => {}
                Err(e) => warn!(deposit_id = %deposit.id, error = %e, "Re-drive failed"),
            }
        }

        for credited in self.stores.deposits.credited_totals().await? {
            let wallet_total = match self.stores.wallets.get_wallet(&credited.user_id).await {
                Ok(w) => w.map(|w| w.total_deposited).unwrap_or(Decimal::ZERO),
                Err(e) => {
                    warn!(user_id = %credited.user_id, error = %e, "Wallet read failed");
                    continue;
                }
            };
            if credited.total <= wallet_total {
                continue;
            }
            debug!(
                user_id = %credited.user_id,
                credited_total = %credited.total,
                %wallet_total,
                "Wallet behind credited deposits"
            );
            match self.ledger.settle(&credited.user_id).await {
                Ok(Some(_)) => report.wallets_repaired += 1,
                Ok(None) => {}
                Err(e) => warn!(user_id = %credited.user_id, error = %e, "Wallet repair failed"),
            }
        }

        if report.is_empty() {
            debug!("Reconciliation sweep found nothing to do");
        } else {
            info!(
                redriven = report.redriven,
                wallets_repaired = report.wallets_repaired,
                "Reconciliation sweep repaired state"
            );
        }
        Ok(report)
    }

    /// Run sweeps on the configured interval until shutdown.
    pub async fn run(
        self,
        config: ConfigStore<ReconcilerConfig>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Reconciler started");
        let mut config_watcher = config.subscribe();

        loop {
            let ReconcilerConfig { enabled, interval } = config.get();

            tokio::select! {
                biased;

                // Check for shutdown
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Reconciler received shutdown signal");
                        break;
                    }
                }

                changed = config_watcher.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    info!("Reconciler configuration reloaded");
                }

                _ = tokio::time::sleep(interval), if enabled => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }

        info!("Reconciler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DepositStatus;
    use crate::entities::deposit::{Deposit, DepositInsert};
    use crate::events::wallet_event_channel;
    use crate::store::{DepositStore, MemoryStore, WalletStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn reconciler(store: &Arc<MemoryStore>) -> Reconciler {
        let stores = Stores::memory(store.clone());
        let (tx, _) = wallet_event_channel();
        Reconciler::new(stores.clone(), LedgerUpdater::new(stores, tx))
    }

    async fn confirmed(store: &MemoryStore, user: &str, amount: Decimal) -> Deposit {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::now_v7();
        let d = store
            .insert(DepositInsert {
                id,
                user_id: user.into(),
                order_id: format!("deposit_{user}_{id}"),
                amount_usd: amount,
                external_payment_id: id.to_string(),
                pay_currency_amount: dec!(0.001),
                pay_address: "bc1q".into(),
                payment_url: None,
                is_demo: false,
                created_at: now,
                expires_at: now + time::Duration::minutes(30),
            })
            .await
            .unwrap();
        store
            .update_status(d.id, DepositStatus::Pending, DepositStatus::Confirmed, now)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sweep_redrives_stuck_deposits() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(&store);
        confirmed(&store, "u1", dec!(10)).await;
        confirmed(&store, "u2", dec!(30)).await;

        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report.redriven, 2);
        assert_eq!(report.wallets_repaired, 0);
        assert_eq!(store.get_wallet("u2").await.unwrap().unwrap().balance, dec!(30));
        assert!(reconciler.sweep().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_skips_failing_claims() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(&store);
        confirmed(&store, "u1", dec!(10)).await;

        store.set_fail_credit_claims(true);
        assert!(reconciler.sweep().await.unwrap().is_empty());
        store.set_fail_credit_claims(false);
        assert_eq!(reconciler.sweep().await.unwrap().redriven, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let config = ConfigStore::new(ReconcilerConfig {
            enabled: true,
            interval: Duration::from_secs(60),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(reconciler(&store).run(config.clone(), shutdown_rx));

        confirmed(&store, "u1", dec!(10)).await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.get_wallet("u1").await.unwrap().unwrap().balance, dec!(10));

        config.update(ReconcilerConfig {
            enabled: false,
            interval: Duration::from_secs(1),
        });
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
