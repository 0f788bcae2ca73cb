//! Tracker configuration
//!
//! Values come from the optional `folio-rt.toml` in the root folder; CLI
//! flags override the server URL and article. Durations are given in the
//! file as whole seconds or milliseconds.

use std::time::Duration;

use folio_common::config::LoggingConfig;
use folio_common::time::millis_to_duration;
use serde::Deserialize;

/// Tracker configuration file name inside the root folder
pub const CONFIG_FILE_NAME: &str = "folio-rt.toml";

/// Default progress service address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5730";

/// How an article that fits in the viewport is scored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortContentPolicy {
    /// Progress jumps to 100 on the first observed sample
    #[default]
    CompleteOnFirstPaint,
    /// Progress waits for the host to call `mark_complete`
    AwaitExplicitComplete,
}

/// Runtime tracker settings
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub server_url: String,
    /// Period of the forced background sync
    pub sync_interval: Duration,
    /// Period of the engagement-time tick
    pub tick_interval: Duration,
    /// Progress points a scroll must move before it triggers a sync
    pub sync_threshold: f64,
    pub request_timeout: Duration,
    pub short_content: ShortContentPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            sync_interval: Duration::from_secs(10),
            tick_interval: Duration::from_secs(1),
            sync_threshold: 10.0,
            request_timeout: Duration::from_secs(5),
            short_content: ShortContentPolicy::default(),
        }
    }
}

/// On-disk form of [`TrackerConfig`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub server_url: Option<String>,
    pub sync_interval_secs: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    pub sync_threshold: Option<f64>,
    pub request_timeout_secs: Option<u64>,
    pub short_content: Option<ShortContentPolicy>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Overlay the file's values on the defaults
    pub fn tracker_config(&self) -> TrackerConfig {
        let defaults = TrackerConfig::default();
        TrackerConfig {
            server_url: self.server_url.clone().unwrap_or(defaults.server_url),
            sync_interval: self
                .sync_interval_secs
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            tick_interval: self
                .tick_interval_ms
                .filter(|v| *v > 0)
                .map(millis_to_duration)
                .unwrap_or(defaults.tick_interval),
            sync_threshold: self
                .sync_threshold
                .filter(|t| t.is_finite() && *t >= 0.0)
                .unwrap_or(defaults.sync_threshold),
            request_timeout: self
                .request_timeout_secs
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            short_content: self.short_content.unwrap_or(defaults.short_content),
        }
    }
}
