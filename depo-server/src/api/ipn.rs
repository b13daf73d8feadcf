//! Provider IPN endpoint.
//!
//! `POST /ipn` is called by NOWPayments. The raw body is handed to the
//! webhook receiver unparsed so the signature is checked over exactly the
//! bytes the provider signed.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use depo_core::error::DepositError;
use depo_sdk::objects::IpnAck;
use depo_sdk::signature::{IPN_SIGNATURE_HEADER, SignatureError};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ipn", post(receive_ipn))
}

async fn receive_ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, IpnError> {
    let signature = headers
        .get(IPN_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.services.webhooks.receive(&body, signature).await?;
    tracing::debug!(
        deposit_id = %outcome.deposit().id,
        status = %outcome.deposit().status,
        "IPN handled"
    );
    Ok(Json(IpnAck { success: true }))
}

/// Failure answered to the provider.
///
/// 5xx makes the provider retry the delivery; 4xx does not.
#[derive(Debug)]
struct IpnError(DepositError);

impl From<DepositError> for IpnError {
    fn from(e: DepositError) -> Self {
        Self(e)
    }
}

impl IntoResponse for IpnError {
    fn into_response(self) -> Response {
        match self.0 {
            DepositError::Signature(SignatureError::Json(_)) | DepositError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "malformed notification").into_response()
            }
            DepositError::Signature(_) => {
                (StatusCode::UNAUTHORIZED, "invalid signature").into_response()
            }
            DepositError::NotFound => {
                (StatusCode::NOT_FOUND, "deposit not found").into_response()
            }
            e => {
                tracing::error!(error = %e, "IPN handling failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
