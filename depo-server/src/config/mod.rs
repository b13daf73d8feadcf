//! Configuration module for depo-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AdminConfig, DEFAULT_PROVIDER_BASE_URL, DemoConfig, IdentityConfig, ProviderConfig,
    ReconcilerConfig, ServerConfig, SharedConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub identity: IdentityConfig,
    pub provider: ProviderConfig,
    pub demo: DemoConfig,
    pub reconciler: ReconcilerConfig,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig::new(
            self.server,
            self.admin,
            self.identity,
            self.provider,
            self.demo,
            self.reconciler,
        )
    }

    /// Push a reloaded configuration into the live sections.
    ///
    /// The listen address is kept: the socket is already bound.
    pub async fn apply_to(self, shared: &SharedConfig) {
        let mut server = self.server;
        server.listen = shared.server().await.listen;
        shared
            .update_all(
                server,
                self.admin,
                self.identity,
                self.provider,
                self.demo,
                self.reconciler,
            )
            .await;
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret_hash = if AdminConfig::is_hashed(&file_config.admin.secret) {
            file_config.admin.secret.clone()
        } else {
            let hash = AdminConfig::hash_secret(&file_config.admin.secret)
                .map_err(|e| ConfigError::HashError(e.to_string()))?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        build_loaded_config(file_config, secret_hash)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.admin.secret.is_empty() {
        return invalid("admin.secret must not be empty");
    }
    if config.identity.secret.is_empty() {
        return invalid("identity.secret must not be empty");
    }
    if config.demo.enabled && config.server.environment.is_production() {
        return invalid("demo mode cannot be enabled in production");
    }
    if config.provider.verify_ipn_signature
        && config.provider.ipn_secret.as_deref().is_none_or(str::is_empty)
    {
        return invalid("provider.verify_ipn_signature requires provider.ipn_secret");
    }
    if !config.demo.enabled {
        if config.provider.api_key.is_empty() {
            return invalid("provider.api_key is required unless demo mode is enabled");
        }
        if config.provider.callback_url.is_none() {
            return invalid("provider.callback_url is required unless demo mode is enabled");
        }
    }
    if config.provider.request_timeout_secs == 0 {
        return invalid("provider.request_timeout_secs must be positive");
    }
    if config.reconciler.enabled && config.reconciler.interval_secs == 0 {
        return invalid("reconciler.interval_secs must be positive");
    }
    Ok(())
}

fn build_loaded_config(
    file_config: FileConfig,
    secret_hash: String,
) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        server,
        identity,
        provider,
        demo,
        reconciler,
        ..
    } = file_config;

    let base_url = match provider.base_url {
        Some(url) => url,
        None => Url::parse(DEFAULT_PROVIDER_BASE_URL)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?,
    };

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
            environment: server.environment,
        },
        admin: AdminConfig::new(secret_hash),
        identity: IdentityConfig::new(identity.secret.into_bytes()),
        provider: ProviderConfig {
            api_key: provider.api_key,
            base_url,
            ipn_secret: provider
                .ipn_secret
                .map(|s| s.into_bytes().into_boxed_slice()),
            verify_ipn_signature: provider.verify_ipn_signature,
            callback_url: provider.callback_url,
            success_url: provider.success_url,
            cancel_url: provider.cancel_url,
            request_timeout: Duration::from_secs(provider.request_timeout_secs),
        },
        demo: DemoConfig {
            enabled: demo.enabled,
            confirm_after: Duration::from_secs(demo.confirm_after_secs),
        },
        reconciler: ReconcilerConfig {
            enabled: reconciler.enabled,
            interval: Duration::from_secs(reconciler.interval_secs),
        },
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
