//! Runtime configuration re-exports.
//!
//! The actual config types are defined in `depo_core::config`.
//! This module re-exports them for convenience.

pub use depo_core::config::{
    AdminConfig, DEFAULT_PROVIDER_BASE_URL, DemoConfig, IdentityConfig,
    ProviderConfig, ReconcilerConfig, ServerConfig, SharedConfig,
};
