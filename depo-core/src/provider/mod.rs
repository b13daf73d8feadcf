//! Payment provider clients.
//!
//! The initiator and the poller talk to the provider only through
//! [`PaymentProvider`], so the NowPayments client and the demo provider are
//! interchangeable at startup.

mod demo;
mod nowpayments;

pub use demo::{DEMO_INVOICE_URL, DEMO_PAY_ADDRESS, DEMO_USD_PER_BTC, DemoProvider};
pub use nowpayments::NowPaymentsClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// What the initiator asks the provider for.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub order_id: String,
    pub amount_usd: Decimal,
    pub description: String,
}

/// An opened payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub external_payment_id: String,
    pub payment_url: Option<String>,
    pub pay_address: String,
    /// Amount in the pay currency (BTC).
    pub pay_amount: Decimal,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// 401/403 from the provider.
    #[error("provider rejected credentials (status {status})")]
    Auth { status: u16 },
    /// 5xx, timeout or transport failure.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// Response body could not be decoded.
    #[error("malformed provider response: {0}")]
    Malformed(String),
    /// Any other 4xx.
    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sessions from this provider are synthetic.
    fn is_demo(&self) -> bool {
        false
    }

    /// Delay after which the initiator advances a new deposit to `confirmed`
    /// on its own. Only the demo provider uses this.
    fn auto_confirm_after(&self) -> Option<Duration> {
        None
    }

    async fn create_payment(&self, request: &SessionRequest) -> Result<PaymentSession, ProviderError>;

    /// The provider's raw `payment_status` string for a session.
    async fn payment_status(&self, external_payment_id: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(ProviderError::Unavailable("timeout".into()).is_retryable());
        assert!(!ProviderError::Auth { status: 401 }.is_retryable());
        assert!(!ProviderError::Malformed("eof".into()).is_retryable());
        assert!(
            !ProviderError::Rejected {
                status: 400,
                body: String::new()
            }
            .is_retryable()
        );
    }
}
