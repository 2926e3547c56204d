use common::config::{
    duration_or, optional, parse_or, required, BusConfig, ConfigError, DatabaseConfig, EnvVars,
    RedisConfig, ServerConfig,
};
use common::secret::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum allowed bcrypt cost.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum allowed bcrypt cost.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Minimum HMAC signing key length in bytes.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(168 * 60 * 60);

/// Settings consumed by the auth use cases.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub api_gateway_url: String,
}

impl AuthSettings {
    /// # Errors
    ///
    /// Fails on a missing or short signing key, unparseable durations, a
    /// refresh lifetime not longer than the access lifetime, or a bcrypt
    /// cost outside 10..=14.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let jwt_secret = required(vars, "JWT_SECRET_KEY")?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::invalid(
                "JWT_SECRET_KEY",
                format!(
                    "must be at least {MIN_JWT_SECRET_BYTES} bytes, got {}",
                    jwt_secret.len()
                ),
            ));
        }

        let access_token_ttl =
            duration_or(vars, "JWT_ACCESS_TOKEN_DURATION", DEFAULT_ACCESS_TOKEN_TTL)?;
        let refresh_token_ttl =
            duration_or(vars, "JWT_REFRESH_TOKEN_DURATION", DEFAULT_REFRESH_TOKEN_TTL)?;

        if access_token_ttl < Duration::from_secs(1) {
            return Err(ConfigError::invalid(
                "JWT_ACCESS_TOKEN_DURATION",
                "must be at least 1s",
            ));
        }
        // The session record lives as long as the refresh token; it must
        // outlive every access binding minted alongside it.
        if refresh_token_ttl <= access_token_ttl {
            return Err(ConfigError::invalid(
                "JWT_REFRESH_TOKEN_DURATION",
                "must be longer than JWT_ACCESS_TOKEN_DURATION",
            ));
        }

        let bcrypt_cost: u32 = parse_or(vars, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::invalid(
                "BCRYPT_COST",
                format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}, got {bcrypt_cost}"),
            ));
        }

        let api_gateway_url = optional(vars, "API_GATEWAY_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            access_token_ttl,
            refresh_token_ttl,
            bcrypt_cost,
            api_gateway_url,
        })
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub bus: BusConfig,
    pub auth: AuthSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&common::config::env_vars())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_vars(vars, "0.0.0.0:8081")?,
            database: DatabaseConfig::from_vars(vars)?,
            redis: RedisConfig::from_vars(vars)?,
            bus: BusConfig::from_vars(vars)?,
            auth: AuthSettings::from_vars(vars)?,
        })
    }
}
