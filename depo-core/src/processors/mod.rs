//! Deposit and wallet processors.
//!
//! - `PaymentInitiator`: validates, opens a provider session, stores a `pending` deposit
//! - `WebhookReceiver`: authenticates and applies provider IPN callbacks
//! - `StatusPoller`: client-triggered re-read and provider refresh
//! - `StatusApplier`: shared expiry and transition path for both of the above
//! - `LedgerUpdater`: exactly-once crediting, wallet reads and debits
//! - `Reconciler`: periodic repair of stuck deposits and drifted wallets

pub mod initiator;
pub mod ledger;
pub mod reconciler;
pub mod status_applier;
pub mod status_poller;
pub mod webhook_receiver;

pub use initiator::{DEPOSIT_TTL, MAX_DEPOSIT_USD, MIN_DEPOSIT_USD, PaymentInitiator, next_order_id};
pub use ledger::{CreditOutcome, LedgerUpdater};
pub use reconciler::{Reconciler, SweepReport};
pub use status_applier::{ObservationOutcome, StatusApplier};
pub use status_poller::StatusPoller;
pub use webhook_receiver::WebhookReceiver;

use crate::config::ProviderConfig;
use crate::events::WalletEventSender;
use crate::provider::PaymentProvider;
use crate::store::Stores;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Every processor, wired to the same stores, provider and event channel.
#[derive(Clone)]
pub struct DepositServices {
    pub initiator: PaymentInitiator,
    pub webhooks: WebhookReceiver,
    pub poller: StatusPoller,
    pub ledger: LedgerUpdater,
    pub reconciler: Reconciler,
    /// The session provider chosen at startup.
    pub provider: Arc<dyn PaymentProvider>,
}

impl DepositServices {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn PaymentProvider>,
        provider_config: Arc<RwLock<ProviderConfig>>,
        events: WalletEventSender,
    ) -> Self {
        let ledger = LedgerUpdater::new(stores.clone(), events.clone());
        let applier = StatusApplier::new(stores.clone(), ledger.clone(), events.clone());
        Self {
            initiator: PaymentInitiator::new(
                stores.clone(),
                provider.clone(),
                applier.clone(),
                events,
            ),
            webhooks: WebhookReceiver::new(stores.clone(), applier.clone(), provider_config),
            poller: StatusPoller::new(stores.clone(), provider.clone(), applier),
            reconciler: Reconciler::new(stores, ledger.clone()),
            ledger,
            provider,
        }
    }
}
