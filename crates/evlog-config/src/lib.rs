//! # evlog-config
//!
//! Layered configuration loading for evlog using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`EVLOG_*` prefix, `__` as separator)
//! 2. Project-level `.evlog/config.toml`
//! 3. User-level `~/.config/evlog/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `EVLOG_EVENT_LOG__TABLE_PREFIX` -> `event_log.table_prefix`.
//!
//! # Usage
//!
//! ```no_run
//! use evlog_config::EvlogConfig;
//!
//! let config = EvlogConfig::load_with_dotenv().expect("config");
//! println!("log table: {}", config.event_log.table_names().log);
//! ```

mod database;
mod error;
mod event_log;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use event_log::EventLogConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EvlogConfig {
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

impl EvlogConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Extract and validate from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".evlog/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("EVLOG_").split("__"))
    }

    /// Check cross-field constraints figment cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.event_log.validate()?;
        database::validate_databases(&self.databases)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("evlog").join("config.toml"))
    }

    /// Load `.env` from the workspace root, walking up from the crate dir.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}
