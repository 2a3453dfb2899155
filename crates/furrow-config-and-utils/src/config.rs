//! Configuration management for Furrow clients.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://furrow.supabase.co",
};

/// Default Supabase publishable key (can be overridden at compile time via SUPABASE_PUBLISHABLE_KEY env var).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "furrow-publishable-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default loopback port for the federated sign-in callback.
pub const DEFAULT_OAUTH_CALLBACK_PORT: u16 = 9876;

/// Default time to wait for the federated sign-in callback.
pub const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 120;

/// Default polling cadence for live report queries against the REST store.
pub const DEFAULT_REPORT_POLL_INTERVAL_SECS: u64 = 5;

/// How long a cached report list stays fresh (5 minutes).
pub const DEFAULT_LIST_STALE_SECS: u64 = 300;

/// Upper bound for `list_stale_secs` (one day).
pub const MAX_LIST_STALE_SECS: u64 = 86_400;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// Loopback port used by the Google sign-in callback server.
    #[serde(default = "default_oauth_callback_port")]
    pub oauth_callback_port: u16,
    /// Seconds to wait for the Google sign-in callback.
    #[serde(default = "default_oauth_timeout_secs")]
    pub oauth_timeout_secs: u64,
    /// Seconds between polls of a live report query.
    #[serde(default = "default_report_poll_interval_secs")]
    pub report_poll_interval_secs: u64,
    /// Seconds a cached report list is served without refetching.
    #[serde(default = "default_list_stale_secs")]
    pub list_stale_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_oauth_callback_port() -> u16 {
    DEFAULT_OAUTH_CALLBACK_PORT
}

fn default_oauth_timeout_secs() -> u64 {
    DEFAULT_OAUTH_TIMEOUT_SECS
}

fn default_report_poll_interval_secs() -> u64 {
    DEFAULT_REPORT_POLL_INTERVAL_SECS
}

fn default_list_stale_secs() -> u64 {
    DEFAULT_LIST_STALE_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            supabase_publishable_key: DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string(),
            oauth_callback_port: DEFAULT_OAUTH_CALLBACK_PORT,
            oauth_timeout_secs: DEFAULT_OAUTH_TIMEOUT_SECS,
            report_poll_interval_secs: DEFAULT_REPORT_POLL_INTERVAL_SECS,
            list_stale_secs: DEFAULT_LIST_STALE_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    ///
    /// Environment variables are applied last.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("FURROW_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Reject values the clients cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        if self.supabase_publishable_key.trim().is_empty() {
            return Err(CoreError::Config(
                "supabase_publishable_key must not be empty".to_string(),
            ));
        }
        if self.report_poll_interval_secs == 0 {
            return Err(CoreError::Config(
                "report_poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.list_stale_secs > MAX_LIST_STALE_SECS {
            return Err(CoreError::Config(format!(
                "list_stale_secs must be at most {}",
                MAX_LIST_STALE_SECS
            )));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}
