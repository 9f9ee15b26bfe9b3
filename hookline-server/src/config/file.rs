//! TOML file configuration structures.
//!
//! These structs directly map to the `hookline.toml` file format.

use hookline_sdk::config::RawSettings;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub webhooks: RawSettings,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Where registrations live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Postgres at `DATABASE_URL`.
    #[default]
    Postgres,
    /// Process memory; registrations are lost on exit.
    Memory,
}

/// Database configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookline_sdk::config::RawHook;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[database]
backend = "memory"

[webhooks]
timeout = 5
hide_token = true
task_handler = "sync"
models = ["auth.models.Group"]

[webhooks.hooks]
"auth.models.User" = "default"

[webhooks.hooks."shop.models.Order"]
CREATE = "default"
DELETE = "deny"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.webhooks.timeout, 5);
        assert!(config.webhooks.hide_token);
        assert_eq!(
            config.webhooks.hooks["auth.models.User"],
            RawHook::Marker("default".to_string())
        );
        assert!(matches!(
            config.webhooks.hooks["shop.models.Order"],
            RawHook::PerKind(_)
        ));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.database.backend, StoreBackend::Postgres);
        assert_eq!(config.webhooks, RawSettings::default());
    }
}
