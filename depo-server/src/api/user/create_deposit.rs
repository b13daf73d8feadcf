use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use depo_sdk::objects::CreateDepositRequest;

use crate::api::ApiError;
use crate::api::extractors::AuthenticatedUser;
use crate::state::AppState;

/// `POST /deposits`: open a BTC payment session for a USD amount.
///
/// Responds `201 Created` with the `pending` deposit, including the pay
/// address and amount to show the user.
pub(super) async fn create_deposit(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(body): Json<CreateDepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let deposit = state
        .services
        .initiator
        .create_deposit(&user_id, body.amount_usd)
        .await?;

    Ok((StatusCode::CREATED, Json(deposit.to_response())))
}
