use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use depo_core::events::WalletEvent;
use depo_sdk::objects::ws::{WsCloseCode, WsServerMessage};
use tokio::sync::broadcast::error::RecvError;

use crate::api::extractors::AuthenticatedUser;
use crate::state::AppState;

/// `GET /wallet/ws` - WebSocket stream of the caller's wallet.
///
/// Upgrades the HTTP connection to a WebSocket and pushes
/// [`WsServerMessage`] JSON frames. The first frame is always the current
/// wallet; afterwards every deposit status change and balance change of
/// this user is forwarded until the client disconnects or the server
/// shuts down.
pub(super) async fn wallet_ws(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_wallet_ws(socket, state, user_id))
}

/// Background task that drives a single WebSocket connection.
///
/// 1. Sends the current wallet as the first message.
/// 2. Relays this user's events from the broadcast channel.
/// 3. On lag, re-sends a fresh wallet snapshot.
async fn handle_wallet_ws(mut socket: WebSocket, state: AppState, user_id: String) {
    // Subscribe before the snapshot read so a concurrent credit is not lost.
    let mut events = state.events.subscribe();
    let mut shutdown = state.shutdown.clone();

    if send_wallet(&mut socket, &state, &user_id).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                close(&mut socket, WsCloseCode::GOING_AWAY, "server shutting down").await;
                return;
            }

            result = events.recv() => {
                match result {
                    Ok(event) if event.user_id() == user_id => {
                        let msg = match event {
                            WalletEvent::DepositStatusChanged { deposit_id, status, .. } => {
                                WsServerMessage::Deposit {
                                    deposit_id,
                                    status: status.into(),
                                }
                            }
                            WalletEvent::BalanceChanged { .. } => {
                                if send_wallet(&mut socket, &state, &user_id).await.is_err() {
                                    return;
                                }
                                continue;
                            }
                        };
                        if send_json(&mut socket, &msg).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(
                            user_id = %user_id,
                            skipped = n,
                            "WS: broadcast receiver lagged, resending wallet"
                        );
                        if send_wallet(&mut socket, &state, &user_id).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    close(&mut socket, WsCloseCode::NORMAL, "").await;
}

/// Read the wallet and push it. On a read failure the client gets an error
/// frame and the connection is closed.
async fn send_wallet(socket: &mut WebSocket, state: &AppState, user_id: &str) -> Result<(), ()> {
    match state.services.ledger.wallet(user_id).await {
        Ok(wallet) => {
            send_json(
                socket,
                &WsServerMessage::Wallet {
                    wallet: wallet.to_response(),
                },
            )
            .await
        }
        Err(e) => {
            tracing::error!(error = %e, %user_id, "WS: failed to read wallet");
            let _ = send_json(
                socket,
                &WsServerMessage::Error {
                    code: WsCloseCode::INTERNAL_ERROR,
                    reason: "internal error".into(),
                },
            )
            .await;
            close(socket, WsCloseCode::INTERNAL_ERROR, "internal error").await;
            Err(())
        }
    }
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
