use common::config::{BusConfig, ConfigError, DatabaseConfig, EnvVars, ServerConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bus: BusConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&common::config::env_vars())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_vars(vars, "0.0.0.0:8082")?,
            database: DatabaseConfig::from_vars(vars)?,
            bus: BusConfig::from_vars(vars)?,
        })
    }
}
