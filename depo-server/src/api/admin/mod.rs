//! Admin API handlers.
//!
//! These endpoints are called by operators and require the
//! `Depo-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /deposits`           – list deposits (paginated, filterable by status and user)
//! - `GET  /wallets/{user_id}`  – show a user's wallet
//! - `POST /reconcile`          – run a reconciliation sweep now

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod list_deposits;
mod reconcile;
mod show_wallet;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deposits", get(list_deposits::list_deposits))
        .route("/wallets/{user_id}", get(show_wallet::show_wallet))
        .route("/reconcile", post(reconcile::reconcile))
}
