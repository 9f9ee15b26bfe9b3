//! Configuration module for hookline-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use hookline_core::config::Settings;
use hookline_core::extensions::ExtensionRegistry;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid webhook settings: {0}")]
    SettingsError(#[from] hookline_core::config::ConfigError),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
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

    /// Read the TOML file and apply CLI overrides.
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        Ok(file_config)
    }

    /// Re-read the file and resolve its `[webhooks]` section (used during
    /// SIGHUP). Nothing is applied if either step fails.
    pub fn reload(&self, registry: &ExtensionRegistry) -> Result<(FileConfig, Settings), ConfigError> {
        let file_config = self.load()?;
        let settings = Settings::resolve(&file_config.webhooks, registry)?;
        Ok((file_config, settings))
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
