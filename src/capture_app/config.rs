use std::path::PathBuf;

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Environment variable holding a previously issued bearer token
pub const ENV_TOKEN: &str = "RBP_TOKEN";

/// Client configuration: application settings plus the session token
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            token: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self { app, token: None })
    }

    /// Defaults, then `RBP_*` variables, including `RBP_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::with_builder(AppConfig::builder().apply_env()?)?;
        config.token = std::env::var(ENV_TOKEN).ok().filter(|t| !t.trim().is_empty());
        Ok(config)
    }

    pub fn from_app(app: AppConfig) -> Self {
        Self { app, token: None }
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Set the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the bearer token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    /// Location of the offline queue database
    pub fn database_path(&self) -> PathBuf {
        self.app.database_path()
    }
}
