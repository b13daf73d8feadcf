//! Live wallet and deposit notifications.
//!
//! The ledger, the webhook receiver and the poller publish [`WalletEvent`]s
//! on a broadcast channel; the WebSocket endpoint filters them per user.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, WalletEventReceiver, WalletEventSender, publish, wallet_event_channel,
};
pub use types::WalletEvent;
