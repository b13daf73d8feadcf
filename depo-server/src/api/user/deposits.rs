use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use depo_sdk::objects::admin::clamp_pagination;
use depo_sdk::objects::{DepositHistoryQuery, DepositResponse, PollDepositQuery};
use uuid::Uuid;

use crate::api::ApiError;
use crate::api::extractors::AuthenticatedUser;
use crate::state::AppState;

/// `GET /deposits`: the caller's deposits, newest first.
pub(super) async fn list_deposits(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<DepositHistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);
    let deposits = state
        .services
        .poller
        .history(&user_id, limit, offset)
        .await?;

    Ok(Json(
        deposits
            .iter()
            .map(|d| d.to_response())
            .collect::<Vec<DepositResponse>>(),
    ))
}

/// `GET /deposits/{deposit_id}`: current state of one deposit.
///
/// Fallback for missed webhooks: with `refresh=true` an open deposit is
/// re-checked with the provider. Someone else's deposit is a 404.
pub(super) async fn poll_deposit(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(deposit_id): Path<Uuid>,
    Query(query): Query<PollDepositQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let deposit = state
        .services
        .poller
        .poll(&user_id, deposit_id, query.refresh)
        .await?;

    Ok(Json(deposit.to_response()))
}
