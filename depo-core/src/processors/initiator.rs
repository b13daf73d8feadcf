//! PaymentInitiator processor.
//!
//! The PaymentInitiator is responsible for:
//! - Validating the requested amount before anything leaves the process
//! - Generating a unique, strictly increasing order id
//! - Opening a BTC payment session with the provider
//! - Persisting the `pending` deposit only after the provider succeeded
//! - Scheduling the automatic confirmation of demo sessions

use super::status_applier::StatusApplier;
use crate::entities::DepositStatus;
use crate::entities::deposit::{Deposit, DepositInsert};
use crate::error::DepositError;
use crate::events::{WalletEvent, WalletEventSender, publish};
use crate::provider::{PaymentProvider, SessionRequest};
use crate::store::Stores;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Smallest accepted deposit, inclusive.
pub const MIN_DEPOSIT_USD: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
/// Largest accepted deposit, inclusive.
pub const MAX_DEPOSIT_USD: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
/// How long a payment session stays open.
pub const DEPOSIT_TTL: time::Duration = time::Duration::minutes(30);

static LAST_ORDER_NANOS: AtomicI64 = AtomicI64::new(0);

/// `deposit_{user_id}_{unix_nanos}`, strictly increasing within the process.
pub fn next_order_id(user_id: &str) -> String {
    let now = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos()).unwrap_or(i64::MAX);
    let previous = match LAST_ORDER_NANOS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last.saturating_add(1)))
    }) {
        Ok(previous) | Err(previous) => previous,
    };
    let nanos = now.max(previous.saturating_add(1));
    format!("deposit_{user_id}_{nanos}")
}

pub fn validate_amount(amount_usd: Decimal) -> Result<(), DepositError> {
    if amount_usd < MIN_DEPOSIT_USD || amount_usd > MAX_DEPOSIT_USD {
        return Err(DepositError::Validation(format!(
            "amount must be between {MIN_DEPOSIT_USD} and {MAX_DEPOSIT_USD} USD, got {amount_usd}"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PaymentInitiator {
    stores: Stores,
    provider: Arc<dyn PaymentProvider>,
    applier: StatusApplier,
    events: WalletEventSender,
}

impl PaymentInitiator {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn PaymentProvider>,
        applier: StatusApplier,
        events: WalletEventSender,
    ) -> Self {
        Self {
            stores,
            provider,
            applier,
            events,
        }
    }

    /// Open a payment session and record it as a `pending` deposit.
    #[tracing::instrument(skip(self), err, fields(provider = self.provider.name()))]
    pub async fn create_deposit(
        &self,
        user_id: &str,
        amount_usd: Decimal,
    ) -> Result<Deposit, DepositError> {
        if user_id.trim().is_empty() {
            return Err(DepositError::Validation("user id must not be empty".into()));
        }
        validate_amount(amount_usd)?;

        let order_id = next_order_id(user_id);
        let session = self
            .provider
            .create_payment(&SessionRequest {
                order_id: order_id.clone(),
                amount_usd,
                description: format!("Wallet deposit for user {user_id}"),
            })
            .await
            .inspect_err(|e| warn!(order_id, error = %e, "Provider refused payment session"))?;

        let created_at = OffsetDateTime::now_utc();
        let insert = DepositInsert {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            order_id,
            amount_usd,
            external_payment_id: session.external_payment_id,
            pay_currency_amount: session.pay_amount,
            pay_address: session.pay_address,
            payment_url: session.payment_url,
            is_demo: self.provider.is_demo(),
            created_at,
            expires_at: created_at + DEPOSIT_TTL,
        };
        let deposit = self.stores.deposits.insert(insert).await.inspect_err(|e| {
            error!(error = %e, "Payment session opened but the deposit could not be stored");
        })?;

        info!(
            deposit_id = %deposit.id,
            order_id = %deposit.order_id,
            amount_usd = %deposit.amount_usd,
            "Deposit created"
        );
        publish(&self.events, WalletEvent::deposit(&deposit));

        if let Some(delay) = self.provider.auto_confirm_after() {
            self.schedule_confirmation(deposit.clone(), delay);
        }
        Ok(deposit)
    }

    fn schedule_confirmation(&self, deposit: Deposit, delay: Duration) {
        let applier = self.applier.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let deposit_id = deposit.id;
            match applier.observe(deposit, DepositStatus::Confirmed).await {
                Ok(outcome) => info!(
                    deposit_id = %deposit_id,
                    status = %outcome.deposit().status,
                    "Demo deposit auto-confirmed"
                ),
                Err(e) => warn!(deposit_id = %deposit_id, error = %e, "Demo auto-confirmation failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_bounds_are_inclusive() {
        assert!(validate_amount(dec!(5)).is_ok());
        assert!(validate_amount(dec!(1000)).is_ok());
        assert!(validate_amount(dec!(4.99)).is_err());
        assert!(validate_amount(dec!(1000.01)).is_err());
        assert!(validate_amount(dec!(0)).is_err());
        assert!(validate_amount(dec!(-10)).is_err());
    }

    #[test]
    fn test_order_ids_strictly_increase() {
        let nanos = |id: &str| -> i64 { id.rsplit('_').next().unwrap().parse().unwrap() };
        let mut last = 0;
        for _ in 0..1000 {
            let id = next_order_id("user_with_underscores");
            assert!(id.starts_with("deposit_user_with_underscores_"));
            let n = nanos(&id);
            assert!(n > last);
            last = n;
        }
    }
}
