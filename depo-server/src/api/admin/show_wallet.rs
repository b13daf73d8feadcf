use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use depo_core::error::DepositError;

use crate::api::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `GET /wallets/{user_id}`: a user's wallet. 404 if the user never had one.
pub async fn show_wallet(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state
        .stores
        .wallets
        .get_wallet(&user_id)
        .await
        .map_err(DepositError::from)?
        .ok_or(DepositError::NotFound)?;

    Ok(Json(wallet.to_response()))
}
