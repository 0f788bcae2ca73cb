//! Configuration management for folio-ps
//!
//! Two tiers:
//! 1. **TOML bootstrap** (`folio-ps.toml` in the root folder): bind address,
//!    port, database path, logging. Read once at startup.
//! 2. **Database runtime** (`settings` table): retry budget for the
//!    upsert-merge loop. Missing values are written back with defaults.
//!
//! Command-line flags override the TOML file.

use folio_common::config::LoggingConfig;
use folio_common::db::settings::get_setting_or;
use folio_common::time::millis_to_duration;
use folio_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::retry::RetryPolicy;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5730;

/// Bootstrap configuration file name inside the root folder
pub const CONFIG_FILE_NAME: &str = "folio-ps.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path; defaults to `<root>/folio.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            database_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Runtime settings loaded from the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub write_max_attempts: u32,
    pub write_backoff_ms: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            write_max_attempts: 3,
            write_backoff_ms: 50,
        }
    }
}

impl RuntimeSettings {
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            write_max_attempts: get_setting_or(
                pool,
                "progress_write_max_attempts",
                defaults.write_max_attempts,
            )
            .await?,
            write_backoff_ms: get_setting_or(
                pool,
                "progress_write_backoff_ms",
                defaults.write_backoff_ms,
            )
            .await?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.write_max_attempts, millis_to_duration(self.write_backoff_ms))
    }
}
