//! Error taxonomy shared by the deposit processors.

use crate::provider::ProviderError;
use crate::store::StoreError;
use depo_sdk::signature::SignatureError;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum DepositError {
    /// Rejected input. Raised before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Unknown deposit, or one the caller does not own.
    #[error("deposit not found")]
    NotFound,
    /// A conditional write kept losing to concurrent writers.
    #[error("concurrent update conflict")]
    Conflict,
    #[error("storage error: {0}")]
    Persistence(#[from] StoreError),
    #[error("notification signature rejected: {0}")]
    Signature(#[from] SignatureError),
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
}

impl DepositError {
    /// Failures a caller may retry without changing the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            DepositError::Provider(e) => e.is_retryable(),
            DepositError::Persistence(_) | DepositError::Conflict => true,
            _ => false,
        }
    }
}
