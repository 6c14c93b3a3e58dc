//! Runtime configuration for the session core.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default API URL (can be overridden at compile time via WORKOUT_API_URL env var).
pub const DEFAULT_API_URL: &str = match option_env!("WORKOUT_API_URL") {
    Some(url) => url,
    None => "http://localhost:8080/api",
};

/// Default publishable API key (can be overridden at compile time via WORKOUT_API_KEY env var).
pub const DEFAULT_API_KEY: &str = match option_env!("WORKOUT_API_KEY") {
    Some(key) => key,
    None => "local-dev-key",
};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 2;

const DATA_DIR_NAME: &str = "workout-session";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How reconciliation treats a local clock the server knows nothing about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StaleClockPolicy {
    /// Leave the local clock running as an advisory banner.
    #[default]
    Keep,
    /// A confirmed not-found ends the local clock.
    ClearOnNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_history_page_size")]
    pub history_page_size: usize,
    #[serde(default)]
    pub stale_clock_policy: StaleClockPolicy,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{DATA_DIR_NAME}")))
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_history_page_size() -> usize {
    DEFAULT_HISTORY_PAGE_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_url: default_api_url(),
            api_key: default_api_key(),
            data_dir: default_data_dir(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            stale_clock_policy: StaleClockPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults, then environment overrides.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Reads `path` when it exists, otherwise defaults; environment wins either way.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.load_from_env();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("WORKOUT_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(data_dir) = std::env::var("WORKOUT_DATA_DIR") {
            if !data_dir.trim().is_empty() {
                self.data_dir = PathBuf::from(data_dir);
            }
        }
        if let Ok(api_url) = std::env::var("WORKOUT_API_URL") {
            if !api_url.trim().is_empty() {
                self.api_url = api_url;
            }
        }
    }

    pub fn api_url(&self) -> ConfigResult<Url> {
        Ok(Url::parse(&self.api_url)?)
    }

    /// Period of the clock and rest timer ticks; never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn history_page_size(&self) -> usize {
        self.history_page_size.max(1)
    }
}
