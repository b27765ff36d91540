//! Application configuration module
//!
//! Settings come from three layers, later layers winning: built-in defaults,
//! an optional TOML file, and `RBP_*` environment variables.
//!
//! ```toml
//! server_url = "https://reports.example.com"
//! auto_sync = true
//! probe_interval_secs = 15
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default Remote Report Store URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000";
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
const DEFAULT_MIN_SYNC_INTERVAL_SECS: u64 = 10;
const APP_DIR_NAME: &str = "report-builder-pro";

pub const ENV_API_URL: &str = "RBP_API_URL";
pub const ENV_DATA_DIR: &str = "RBP_DATA_DIR";
pub const ENV_AUTO_SYNC: &str = "RBP_AUTO_SYNC";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL of the Remote Report Store, without trailing slash
    pub server_url: String,
    /// Directory holding the offline queue database
    pub data_dir: PathBuf,
    /// Run a sync pass automatically when connectivity comes back
    pub auto_sync: bool,
    /// Seconds between reachability probes
    pub probe_interval_secs: u64,
    /// Automatic passes closer together than this are skipped
    pub min_sync_interval_secs: u64,
    /// Per-request timeout; `None` leaves requests unbounded
    pub request_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            data_dir: default_data_dir(),
            auto_sync: true,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            min_sync_interval_secs: DEFAULT_MIN_SYNC_INTERVAL_SECS,
            request_timeout_secs: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Shape of the optional TOML file; every key may be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    data_dir: Option<PathBuf>,
    auto_sync: Option<bool>,
    probe_interval_secs: Option<u64>,
    min_sync_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults overlaid with `RBP_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().apply_env()?.build()
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::builder().toml_str(source)?.build()
    }

    /// Load a TOML file on top of the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Full path of the offline queue database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("offline_reports.db")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.server_url)?;
        if self.probe_interval_secs == 0 {
            return Err(ConfigError::Parse {
                key: "probe_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    data_dir: Option<PathBuf>,
    auto_sync: Option<bool>,
    probe_interval_secs: Option<u64>,
    min_sync_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = Some(enabled);
        self
    }

    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.probe_interval_secs = Some(secs);
        self
    }

    pub fn min_sync_interval_secs(mut self, secs: u64) -> Self {
        self.min_sync_interval_secs = Some(secs);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Overlay values from a TOML document
    pub fn toml_str(mut self, source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(source).map_err(|e| ConfigError::Parse {
            key: "file",
            message: e.to_string(),
        })?;
        self.server_url = file.server_url.or(self.server_url);
        self.data_dir = file.data_dir.or(self.data_dir);
        self.auto_sync = file.auto_sync.or(self.auto_sync);
        self.probe_interval_secs = file.probe_interval_secs.or(self.probe_interval_secs);
        self.min_sync_interval_secs = file.min_sync_interval_secs.or(self.min_sync_interval_secs);
        self.request_timeout_secs = file.request_timeout_secs.or(self.request_timeout_secs);
        Ok(self)
    }

    /// Overlay `RBP_API_URL`, `RBP_DATA_DIR` and `RBP_AUTO_SYNC`
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(url) = env_value(ENV_API_URL) {
            self.server_url = Some(url);
        }
        if let Some(dir) = env_value(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = env_value(ENV_AUTO_SYNC) {
            self.auto_sync = Some(parse_bool(ENV_AUTO_SYNC, &flag)?);
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let server_url = match self.server_url {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::MissingValue("server_url"));
            }
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => defaults.server_url,
        };

        let config = AppConfig {
            server_url,
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            auto_sync: self.auto_sync.unwrap_or(defaults.auto_sync),
            probe_interval_secs: self.probe_interval_secs.unwrap_or(defaults.probe_interval_secs),
            min_sync_interval_secs: self
                .min_sync_interval_secs
                .unwrap_or(defaults.min_sync_interval_secs),
            request_timeout_secs: self.request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Parse {
            key,
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {message}")]
    Parse { key: &'static str, message: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}
