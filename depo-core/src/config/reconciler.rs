//! Reconciliation sweep configuration.
//!
//! Held in a [`ConfigStore`](super::ConfigStore) so the sweep loop picks up a
//! new interval on reload without restarting.

use std::time::Duration;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
