use axum::{Json, extract::State, response::IntoResponse};
use depo_sdk::objects::DebitRequest;

use crate::api::ApiError;
use crate::api::extractors::AuthenticatedUser;
use crate::state::AppState;

/// `GET /wallet`: balance and lifetime deposits. Creates an empty wallet
/// on first read.
pub(super) async fn get_wallet(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.services.ledger.wallet(&user_id).await?;
    Ok(Json(wallet.to_response()))
}

/// `POST /wallet/debit`: spend from the balance.
///
/// Answers `409 Conflict` when the balance does not cover the amount.
pub(super) async fn debit_wallet(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(body): Json<DebitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.services.ledger.debit(&user_id, body.amount).await?;
    if let Some(memo) = body.memo.as_deref() {
        tracing::debug!(user_id = %user_id, memo, "Debit memo");
    }
    Ok(Json(wallet.to_response()))
}
