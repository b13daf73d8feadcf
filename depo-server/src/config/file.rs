//! TOML file configuration structures.
//!
//! These structs directly map to the `depo-config.toml` file format.

use depo_core::config::Environment;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub environment: Environment,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (not an argon2 PHC string),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Identity gateway section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// HMAC key shared with the gateway that signs `Depo-User-Id`.
    pub secret: String,
}

/// Payment provider section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Defaults to the public NOWPayments API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipn_secret: Option<String>,
    #[serde(default = "default_true")]
    pub verify_ipn_signature: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<Url>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            ipn_secret: None,
            verify_ipn_signature: true,
            callback_url: None,
            success_url: None,
            cancel_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Demo mode section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_confirm_after_secs")]
    pub confirm_after_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            confirm_after_secs: default_confirm_after_secs(),
        }
    }
}

fn default_confirm_after_secs() -> u64 {
    2
}

/// Reconciliation sweep section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
environment = "staging"

[admin]
secret = "test-secret"

[identity]
secret = "gateway-secret"

[provider]
api_key = "np-key"
ipn_secret = "ipn"
callback_url = "https://depo.example.com/api/v1/ipn"
request_timeout_secs = 5

[demo]
enabled = true

[reconciler]
interval_secs = 30
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.environment, Environment::Staging);
        assert!(config.provider.base_url.is_none());
        assert!(config.provider.verify_ipn_signature);
        assert_eq!(config.provider.request_timeout_secs, 5);
        assert!(config.demo.enabled);
        assert_eq!(config.demo.confirm_after_secs, 2);
        assert!(config.reconciler.enabled);
        assert_eq!(config.reconciler.interval_secs, 30);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let toml_str = r#"
[server]

[admin]
secret = "s"

[identity]
secret = "i"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.server.environment, Environment::Production);
        assert!(!config.demo.enabled);
        assert!(config.provider.ipn_secret.is_none());
    }
}
