//! Synthetic provider for local development.
//!
//! Sessions are deterministic: the id is `demo_{order_id}`, the invoice and
//! address are fixed, and the BTC amount uses a fixed exchange rate. The
//! reported status stays `waiting` until the confirmation delay has passed.

use super::{PaymentProvider, PaymentSession, ProviderError, SessionRequest};
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub const DEMO_INVOICE_URL: &str = "https://nowpayments.io/demo-payment";
pub const DEMO_PAY_ADDRESS: &str = "bc1qdemoaddressfortesting123456";
pub const DEMO_USD_PER_BTC: Decimal = Decimal::from_parts(45000, 0, 0, false, 0);

const DEMO_ID_PREFIX: &str = "demo_";

pub struct DemoProvider {
    confirm_after: Duration,
    opened: RwLock<HashMap<String, Instant>>,
}

impl DemoProvider {
    pub fn new(confirm_after: Duration) -> Self {
        Self {
            confirm_after,
            opened: RwLock::new(HashMap::new()),
        }
    }

    pub fn pay_amount(amount_usd: Decimal) -> Decimal {
        (amount_usd / DEMO_USD_PER_BTC)
            .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[async_trait]
impl PaymentProvider for DemoProvider {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn is_demo(&self) -> bool {
        true
    }

    fn auto_confirm_after(&self) -> Option<Duration> {
        Some(self.confirm_after)
    }

    async fn create_payment(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, ProviderError> {
        let external_payment_id = format!("{DEMO_ID_PREFIX}{}", request.order_id);
        self.opened
            .write()
            .await
            .insert(external_payment_id.clone(), Instant::now());
        Ok(PaymentSession {
            external_payment_id,
            payment_url: Some(DEMO_INVOICE_URL.to_string()),
            pay_address: DEMO_PAY_ADDRESS.to_string(),
            pay_amount: Self::pay_amount(request.amount_usd),
        })
    }

    async fn payment_status(&self, external_payment_id: &str) -> Result<String, ProviderError> {
        let opened = self.opened.read().await.get(external_payment_id).copied();
        let status = match opened {
            Some(at) if at.elapsed() < self.confirm_after => "waiting",
            Some(_) => "confirmed",
            // Sessions from before a restart are treated as settled.
            None if external_payment_id.starts_with(DEMO_ID_PREFIX) => "confirmed",
            None => {
                return Err(ProviderError::Rejected {
                    status: 404,
                    body: format!("unknown demo payment {external_payment_id}"),
                });
            }
        };
        Ok(status.to_string())
    }
}
