//! A config section that background loops can watch.
//!
//! Most sections are read on demand through `Arc<RwLock<_>>`. The reconciler
//! instead sleeps between sweeps, so its section lives in a [`ConfigStore`]:
//! a SIGHUP reload wakes the loop and the new interval applies immediately.

use std::sync::Arc;
use tokio::sync::watch;

pub struct ConfigStore<T> {
    tx: Arc<watch::Sender<T>>,
}

/// Wakes when the owning [`ConfigStore`] receives a new value.
pub struct ConfigWatcher<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Store `value` and wake every watcher, even when nobody is subscribed yet.
    pub fn update(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// The returned watcher only reports updates made after this call.
    pub fn subscribe(&self) -> ConfigWatcher<T> {
        ConfigWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> ConfigWatcher<T> {
    /// Wait for the next update and return the new value.
    ///
    /// Errors once every [`ConfigStore`] handle has been dropped.
    pub async fn changed(&mut self) -> Result<T, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
