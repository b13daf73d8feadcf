//! Configuration types for the deposit service.
//!
//! These types represent the validated runtime configuration used by the server
//! and can be shared across crates. The actual config loading/parsing is handled
//! by the server crate.

mod admin;
mod config_store;
mod demo;
mod identity;
mod provider;
mod reconciler;
mod server;

pub use admin::AdminConfig;
pub use config_store::{ConfigStore, ConfigWatcher};
pub use demo::{DEFAULT_DEMO_CONFIRM_AFTER, DemoConfig};
pub use identity::IdentityConfig;
pub use provider::{DEFAULT_PROVIDER_BASE_URL, DEFAULT_REQUEST_TIMEOUT, ProviderConfig};
pub use reconciler::{DEFAULT_SWEEP_INTERVAL, ReconcilerConfig};
pub use server::{Environment, ServerConfig};

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Shared configuration state with separate locks for each section.
///
/// This allows independent access to different configuration sections
/// without blocking other readers/writers.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address, environment).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Admin configuration (authentication).
    pub admin: Arc<RwLock<AdminConfig>>,
    /// Identity gateway secret for user assertions.
    pub identity: Arc<RwLock<IdentityConfig>>,
    /// Payment provider connection settings.
    pub provider: Arc<RwLock<ProviderConfig>>,
    pub demo: Arc<RwLock<DemoConfig>>,
    /// Sweep schedule, watched by the reconciler loop.
    pub reconciler: ConfigStore<ReconcilerConfig>,
}

impl SharedConfig {
    pub fn new(
        server: ServerConfig,
        admin: AdminConfig,
        identity: IdentityConfig,
        provider: ProviderConfig,
        demo: DemoConfig,
        reconciler: ReconcilerConfig,
    ) -> Self {
        Self {
            server: Arc::new(RwLock::new(server)),
            admin: Arc::new(RwLock::new(admin)),
            identity: Arc::new(RwLock::new(identity)),
            provider: Arc::new(RwLock::new(provider)),
            demo: Arc::new(RwLock::new(demo)),
            reconciler: ConfigStore::new(reconciler),
        }
    }

    pub async fn server(&self) -> RwLockReadGuard<'_, ServerConfig> {
        self.server.read().await
    }

    pub async fn admin(&self) -> RwLockReadGuard<'_, AdminConfig> {
        self.admin.read().await
    }

    pub async fn identity(&self) -> RwLockReadGuard<'_, IdentityConfig> {
        self.identity.read().await
    }

    pub async fn provider(&self) -> RwLockReadGuard<'_, ProviderConfig> {
        self.provider.read().await
    }

    pub async fn demo(&self) -> RwLockReadGuard<'_, DemoConfig> {
        self.demo.read().await
    }

    /// Replace every section. Reconciler watchers are notified.
    ///
    /// The listen address is not hot-reloadable; callers keep the old one.
    pub async fn update_all(
        &self,
        server: ServerConfig,
        admin: AdminConfig,
        identity: IdentityConfig,
        provider: ProviderConfig,
        demo: DemoConfig,
        reconciler: ReconcilerConfig,
    ) {
        // Update in sequence to avoid potential deadlocks
        *self.server.write().await = server;
        *self.admin.write().await = admin;
        *self.identity.write().await = identity;
        *self.provider.write().await = provider;
        *self.demo.write().await = demo;
        self.reconciler.update(reconciler);
    }
}
