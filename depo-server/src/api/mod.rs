//! HTTP API.
//!
//! - `user`: deposits and wallet of the authenticated user
//! - `ipn`: provider webhook
//! - `admin`: operator views and the manual reconciliation trigger

pub mod admin;
pub mod extractors;
pub mod ipn;
pub mod user;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use depo_core::error::DepositError;
use depo_core::provider::ProviderError;

/// A `DepositError` leaving a User or Admin API handler.
#[derive(Debug)]
pub struct ApiError(pub DepositError);

impl From<DepositError> for ApiError {
    fn from(e: DepositError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            DepositError::Validation(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            DepositError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            DepositError::InsufficientFunds { .. } => {
                (StatusCode::CONFLICT, "insufficient funds").into_response()
            }
            DepositError::Provider(ProviderError::Unavailable(e)) => {
                tracing::warn!(error = %e, "Payment provider unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "payment provider unavailable, try again later",
                )
                    .into_response()
            }
            DepositError::Provider(e) => {
                tracing::error!(error = %e, "Payment provider error");
                (StatusCode::BAD_GATEWAY, "payment provider error").into_response()
            }
            e => {
                tracing::error!(error = %e, "API internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
