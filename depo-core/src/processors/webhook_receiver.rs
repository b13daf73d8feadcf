//! WebhookReceiver processor.
//!
//! Handles IPN callbacks pushed by the provider:
//! - Authenticates the raw body against the IPN secret before anything else
//! - Parses the notification and finds the deposit (order id, then payment id)
//! - Maps the provider status and hands it to the shared status path
//!
//! Duplicate and reordered deliveries are safe; the ledger owns the
//! single-credit guarantee.

use super::status_applier::{ObservationOutcome, StatusApplier};
use crate::config::ProviderConfig;
use crate::entities::deposit::Deposit;
use crate::error::DepositError;
use crate::status_map::map_status;
use crate::store::Stores;
use depo_sdk::objects::IpnNotification;
use depo_sdk::signature::{SignatureError, verify_ipn};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct WebhookReceiver {
    stores: Stores,
    applier: StatusApplier,
    config: Arc<RwLock<ProviderConfig>>,
}

impl WebhookReceiver {
    pub fn new(
        stores: Stores,
        applier: StatusApplier,
        config: Arc<RwLock<ProviderConfig>>,
    ) -> Self {
        Self {
            stores,
            applier,
            config,
        }
    }

    async fn authenticate(&self, raw_body: &str, signature: Option<&str>) -> Result<(), DepositError> {
        let config = self.config.read().await;
        if !config.verify_ipn_signature {
            return Ok(());
        }
        let Some(secret) = config.ipn_secret.as_deref() else {
            error!("IPN signature verification is enabled but no IPN secret is configured");
            return Err(SignatureError::SignatureMismatch.into());
        };
        let Some(signature) = signature else {
            warn!("IPN callback without signature header");
            return Err(SignatureError::InvalidFormat.into());
        };
        verify_ipn(raw_body, signature, secret)
            .inspect_err(|e| warn!(error = %e, "IPN signature rejected"))?;
        Ok(())
    }

    async fn find_deposit(&self, notification: &IpnNotification) -> Result<Option<Deposit>, DepositError> {
        if let Some(order_id) = notification.order_id.as_deref() {
            if let Some(deposit) = self.stores.deposits.get_by_order_id(order_id).await? {
                return Ok(Some(deposit));
            }
        }
        if let Some(payment_id) = notification.payment_id.as_deref() {
            if let Some(deposit) = self.stores.deposits.get_by_payment_id(payment_id).await? {
                return Ok(Some(deposit));
            }
        }
        Ok(None)
    }

    /// Handle one IPN delivery.
    ///
    /// `signature` is the raw `x-nowpayments-sig` header value, if any.
    pub async fn receive(
        &self,
        raw_body: &str,
        signature: Option<&str>,
    ) -> Result<ObservationOutcome, DepositError> {
        self.authenticate(raw_body, signature).await?;

        let notification: IpnNotification = serde_json::from_str(raw_body)
            .map_err(|e| DepositError::Validation(format!("malformed notification: {e}")))?;

        let Some(deposit) = self.find_deposit(&notification).await? else {
            info!(
                order_id = ?notification.order_id,
                payment_id = ?notification.payment_id,
                "IPN for unknown deposit"
            );
            return Err(DepositError::NotFound);
        };

        let observed = map_status(&notification.payment_status);
        debug!(
            deposit_id = %deposit.id,
            raw_status = %notification.payment_status,
            %observed,
            "IPN received"
        );
        self.applier.observe(deposit, observed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REQUEST_TIMEOUT;
    use crate::entities::DepositStatus;
    use crate::entities::deposit::DepositInsert;
    use crate::events::wallet_event_channel;
    use crate::processors::ledger::LedgerUpdater;
    use crate::store::{DepositStore, MemoryStore, WalletStore};
    use depo_sdk::signature::sign_ipn;
    use rust_decimal_macros::dec;
    use time::{Duration, OffsetDateTime};
    use url::Url;
    use uuid::Uuid;

    fn receiver(store: &Arc<MemoryStore>, ipn_secret: Option<&[u8]>) -> WebhookReceiver {
        let stores = Stores::memory(store.clone());
        let (tx, _) = wallet_event_channel();
        let ledger = LedgerUpdater::new(stores.clone(), tx.clone());
        let applier = StatusApplier::new(stores.clone(), ledger, tx);
        let config = ProviderConfig {
            api_key: "k".into(),
            base_url: Url::parse("http://127.0.0.1:1/v1").unwrap(),
            ipn_secret: ipn_secret.map(Box::from),
            verify_ipn_signature: ipn_secret.is_some(),
            callback_url: None,
            success_url: None,
            cancel_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        WebhookReceiver::new(stores, applier, Arc::new(RwLock::new(config)))
    }

    async fn pending(store: &MemoryStore, order_id: &str, payment_id: &str) -> Deposit {
        let now = OffsetDateTime::now_utc();
        store
            .insert(DepositInsert {
                id: Uuid::now_v7(),
                user_id: "u1".into(),
                order_id: order_id.into(),
                amount_usd: dec!(50),
                external_payment_id: payment_id.into(),
                pay_currency_amount: dec!(0.00111111),
                pay_address: "bc1q".into(),
                payment_url: None,
                is_demo: false,
                created_at: now,
                expires_at: now + Duration::minutes(30),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_finished_credits_and_repeats_are_noops() {
        let store = Arc::new(MemoryStore::new());
        let receiver = receiver(&store, None);
        pending(&store, "deposit_u1_1", "777").await;

        let body = r#"{"payment_id":777,"payment_status":"finished","pay_amount":0.00111111,"order_id":"deposit_u1_1"}"#;
        let first = receiver.receive(body, None).await.unwrap();
        assert!(matches!(first, ObservationOutcome::Credited(_)));
        let second = receiver.receive(body, None).await.unwrap();
        assert!(matches!(second, ObservationOutcome::AlreadyUpToDate(_)));

        let wallet = store.get_wallet("u1").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(50));
        assert_eq!(wallet.total_deposited, dec!(50));
    }

    #[tokio::test]
    async fn test_falls_back_to_payment_id() {
        let store = Arc::new(MemoryStore::new());
        let receiver = receiver(&store, None);
        let d = pending(&store, "deposit_u1_2", "888").await;

        let body = r#"{"payment_id":"888","payment_status":"confirming","order_id":"somebody-elses"}"#;
        let out = receiver.receive(body, None).await.unwrap();
        assert_eq!(out.deposit().id, d.id);
        assert_eq!(out.deposit().status, DepositStatus::Confirming);

        let unknown = r#"{"payment_id":"999","payment_status":"finished"}"#;
        assert!(matches!(
            receiver.receive(unknown, None).await,
            Err(DepositError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_stored_as_unknown() {
        let store = Arc::new(MemoryStore::new());
        let receiver = receiver(&store, None);
        pending(&store, "deposit_u1_3", "333").await;

        let body = r#"{"payment_id":333,"payment_status":"foo","order_id":"deposit_u1_3"}"#;
        let out = receiver.receive(body, None).await.unwrap();
        assert_eq!(out.deposit().status, DepositStatus::Unknown);
        assert!(store.get_wallet("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signature_checked_before_lookup() {
        let store = Arc::new(MemoryStore::new());
        let receiver = receiver(&store, Some(b"ipn-secret"));
        let d = pending(&store, "deposit_u1_4", "444").await;

        let body = r#"{"payment_id":444,"payment_status":"finished","order_id":"deposit_u1_4"}"#;
        assert!(matches!(
            receiver.receive(body, None).await,
            Err(DepositError::Signature(_))
        ));
        let forged = sign_ipn(body, b"wrong").unwrap();
        assert!(matches!(
            receiver.receive(body, Some(&forged)).await,
            Err(DepositError::Signature(SignatureError::SignatureMismatch))
        ));
        assert_eq!(
            store.get_by_id(d.id).await.unwrap().unwrap().status,
            DepositStatus::Pending
        );

        let signed = sign_ipn(body, b"ipn-secret").unwrap();
        let out = receiver.receive(body, Some(&signed)).await.unwrap();
        assert!(matches!(out, ObservationOutcome::Credited(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let receiver = receiver(&store, None);
        assert!(matches!(
            receiver.receive("{\"payment_id\":1}", None).await,
            Err(DepositError::Validation(_))
        ));
    }
}
