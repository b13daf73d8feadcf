use axum::{Json, extract::State, response::IntoResponse};
use depo_sdk::objects::admin::SweepReportResponse;

use crate::api::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `POST /reconcile`: run one reconciliation sweep and report what it fixed.
pub async fn reconcile(
    State(state): State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Manual reconciliation sweep requested");
    let report = state.services.reconciler.sweep().await?;
    Ok(Json(SweepReportResponse::from(report)))
}
