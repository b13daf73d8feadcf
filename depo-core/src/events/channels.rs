//! Event channel factory and handles.

use super::types::WalletEvent;
use tokio::sync::broadcast;

/// Default buffer size for the wallet event channel.
///
/// Slow subscribers that fall further behind than this observe a lag and
/// skip ahead.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for WalletEvent events.
pub type WalletEventSender = broadcast::Sender<WalletEvent>;
/// Receiver handle for WalletEvent events.
pub type WalletEventReceiver = broadcast::Receiver<WalletEvent>;

/// Create a new WalletEvent channel.
///
/// New subscribers are created with [`broadcast::Sender::subscribe`].
pub fn wallet_event_channel() -> (WalletEventSender, WalletEventReceiver) {
    broadcast::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Publish an event, ignoring the absence of subscribers.
pub fn publish(sender: &WalletEventSender, event: WalletEvent) {
    // Err only means nobody is listening right now.
    let _ = sender.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let (tx, rx) = wallet_event_channel();
        drop(rx);
        publish(
            &tx,
            WalletEvent::BalanceChanged {
                user_id: "u1".into(),
                balance: dec!(1),
                total_deposited: dec!(1),
            },
        );
        let mut late = tx.subscribe();
        publish(
            &tx,
            WalletEvent::BalanceChanged {
                user_id: "u2".into(),
                balance: dec!(2),
                total_deposited: dec!(2),
            },
        );
        assert_eq!(late.recv().await.unwrap().user_id(), "u2");
    }
}
