//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use depo_core::events::{WalletEventSender, wallet_event_channel};
use depo_core::processors::DepositServices;
use depo_core::provider::{DemoProvider, NowPaymentsClient, PaymentProvider, ProviderError};
use depo_core::store::Stores;
use std::sync::Arc;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
    pub stores: Stores,
    /// Initiator, webhook receiver, poller, ledger and reconciler.
    pub services: DepositServices,
    /// Source of the per-user WebSocket streams.
    pub events: WalletEventSender,
    /// Flips to `true` when the server starts shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Wire the processors to `stores` and the provider chosen by the config.
    pub async fn new(
        config: SharedConfig,
        stores: Stores,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ProviderError> {
        let provider = select_provider(&config).await?;
        Ok(Self::with_provider(config, stores, provider, shutdown))
    }

    pub fn with_provider(
        config: SharedConfig,
        stores: Stores,
        provider: Arc<dyn PaymentProvider>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (events, _) = wallet_event_channel();
        let services = DepositServices::new(
            stores.clone(),
            provider,
            config.provider.clone(),
            events.clone(),
        );
        Self {
            config,
            stores,
            services,
            events,
            shutdown,
        }
    }
}

/// Demo sessions when demo mode is on, NOWPayments otherwise.
///
/// Chosen once at startup; toggling demo mode takes a restart.
async fn select_provider(config: &SharedConfig) -> Result<Arc<dyn PaymentProvider>, ProviderError> {
    let demo = config.demo().await;
    if demo.enabled {
        tracing::warn!(
            confirm_after = ?demo.confirm_after,
            "Demo mode enabled: payment sessions are synthetic and confirm themselves"
        );
        return Ok(Arc::new(DemoProvider::new(demo.confirm_after)));
    }
    drop(demo);

    let timeout = config.provider().await.request_timeout;
    Ok(Arc::new(NowPaymentsClient::new(config.provider.clone(), timeout)?))
}
