use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use depo_core::entities::deposit::ListDeposits;
use depo_core::error::DepositError;
use depo_sdk::objects::admin::{AdminDepositResponse, ListDepositsQuery, clamp_pagination};

use crate::api::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `GET /deposits`: list deposits with pagination and optional filters.
///
/// Stored statuses are returned as-is; lazy expiry is only applied on the
/// user-facing read paths.
pub async fn list_deposits(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<ListDepositsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let deposits = state
        .stores
        .deposits
        .list(ListDeposits {
            status: query.status.map(Into::into),
            user_id: query.user_id,
            limit,
            offset,
        })
        .await
        .map_err(DepositError::from)?;

    Ok(Json(
        deposits
            .iter()
            .map(|d| d.to_admin_response())
            .collect::<Vec<AdminDepositResponse>>(),
    ))
}
