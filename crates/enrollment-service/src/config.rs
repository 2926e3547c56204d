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
            server: ServerConfig::from_vars(vars, "0.0.0.0:8083")?,
            database: DatabaseConfig::from_vars(vars)?,
            bus: BusConfig::from_vars(vars)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let vars = EnvVars::from([
            ("DATABASE_URL".to_string(), "postgres://localhost/enrollment".to_string()),
            ("RABBITMQ_URL".to_string(), "amqp://localhost".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.server.bind_address, "0.0.0.0:8083");
        assert_eq!(config.bus.exchange, "lms.events");
    }

    #[test]
    fn test_bus_url_required() {
        let vars = EnvVars::from([(
            "DATABASE_URL".to_string(),
            "postgres://localhost/enrollment".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::MissingEnvVar(v)) if v == "RABBITMQ_URL"
        ));
    }
}
