use common::config::{optional, required, BusConfig, ConfigError, DatabaseConfig, EnvVars, ServerConfig};
use common::secret::SecretString;
use std::fmt;

pub const DEFAULT_ZOOM_BASE_URL: &str = "https://api.zoom.us/v2";
pub const DEFAULT_ZOOM_OAUTH_URL: &str = "https://zoom.us/oauth/token";

/// Server-to-server OAuth app credentials for the meeting provider.
#[derive(Clone)]
pub struct ZoomSettings {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub base_url: String,
    pub oauth_url: String,
}

impl ZoomSettings {
    /// # Errors
    ///
    /// Fails when any of the three credential variables is missing.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        Ok(Self {
            account_id: required(vars, "ZOOM_ACCOUNT_ID")?,
            client_id: required(vars, "ZOOM_CLIENT_ID")?,
            client_secret: SecretString::from(required(vars, "ZOOM_CLIENT_SECRET")?),
            base_url: optional(vars, "ZOOM_BASE_URL", DEFAULT_ZOOM_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            oauth_url: optional(vars, "ZOOM_OAUTH_URL", DEFAULT_ZOOM_OAUTH_URL),
        })
    }
}

impl fmt::Debug for ZoomSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomSettings")
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("oauth_url", &self.oauth_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bus: BusConfig,
    pub zoom: ZoomSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&common::config::env_vars())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_vars(vars, "0.0.0.0:8084")?,
            database: DatabaseConfig::from_vars(vars)?,
            bus: BusConfig::from_vars(vars)?,
            zoom: ZoomSettings::from_vars(vars)?,
        })
    }
}
