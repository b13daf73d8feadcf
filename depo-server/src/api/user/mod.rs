//! User API handlers.
//!
//! These endpoints are called on behalf of a signed-in user and require
//! the `Depo-User-Id` and `Depo-Signature` identity assertion headers.
//!
//! # Endpoints
//!
//! - `POST /deposits`          – open a deposit (payment session)
//! - `GET  /deposits`          – deposit history, newest first
//! - `GET  /deposits/{id}`     – poll one deposit (`?refresh=true` asks the provider)
//! - `GET  /wallet`            – wallet balance
//! - `POST /wallet/debit`      – spend from the wallet
//! - `GET  /wallet/ws`         – WebSocket stream of wallet and deposit changes

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod create_deposit;
mod deposits;
mod wallet;
mod ws;

/// Build the User API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/deposits",
            post(create_deposit::create_deposit).get(deposits::list_deposits),
        )
        .route("/deposits/{deposit_id}", get(deposits::poll_deposit))
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/debit", post(wallet::debit_wallet))
        .route("/wallet/ws", get(ws::wallet_ws))
}
