//! WebSocket message types for the wallet event stream.
//!
//! The `GET /wallet/ws` endpoint upgrades to a WebSocket connection and
//! pushes [`WsServerMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. The server sends a [`WsServerMessage::Wallet`] snapshot immediately
//!    after the upgrade.
//! 2. [`WsServerMessage::Deposit`] frames follow whenever one of the user's
//!    deposits changes status, and [`WsServerMessage::Wallet`] frames whenever
//!    the balance changes.
//! 3. If an internal error occurs the server sends an
//!    [`WsServerMessage::Error`] followed by a close frame with an
//!    application-defined close code (see [`WsCloseCode`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DepositStatus;
use super::wallet::WalletResponse;

/// Server-to-client WebSocket message.
///
/// Serialized as an internally-tagged JSON object so the client can
/// dispatch on the `"type"` field:
///
/// ```json
/// {"type":"wallet","wallet":{ ... }}
/// {"type":"deposit","deposit_id":"...","status":"credited"}
/// {"type":"error","code":1011,"reason":"internal error"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// A wallet snapshot.
    Wallet { wallet: WalletResponse },

    /// A deposit owned by the user changed status.
    Deposit {
        deposit_id: Uuid,
        status: DepositStatus,
    },

    /// A server-side error. The server may still send a close frame
    /// afterwards.
    Error { code: u16, reason: String },
}

/// Well-known WebSocket close codes used by the wallet stream.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// An unexpected server-side error prevented the connection from
    /// continuing.
    pub const INTERNAL_ERROR: u16 = 1011;

    /// The server is shutting down.
    pub const GOING_AWAY: u16 = 1001;
}
