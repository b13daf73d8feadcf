//! Demo provider configuration.

use std::time::Duration;

pub const DEFAULT_DEMO_CONFIRM_AFTER: Duration = Duration::from_secs(2);

/// Synthetic payment sessions for local development.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub enabled: bool,
    /// Delay before a demo deposit is advanced to `confirmed`.
    pub confirm_after: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            confirm_after: DEFAULT_DEMO_CONFIRM_AFTER,
        }
    }
}
