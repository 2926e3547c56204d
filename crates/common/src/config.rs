//! Configuration blocks shared across the LMS services.
//!
//! Every service loads its configuration through `from_vars(&HashMap)` so
//! tests can supply a map instead of mutating the process environment.
//! The blocks here cover the infrastructure every service talks to
//! (Postgres, Redis, the event bus, and the HTTP listener).

use crate::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment snapshot used by `from_vars` constructors.
pub type EnvVars = HashMap<String, String>;

/// The only exchange type the event backbone supports.
pub const EXCHANGE_TYPE_TOPIC: &str = "topic";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Snapshot the process environment.
#[must_use]
pub fn env_vars() -> EnvVars {
    std::env::vars().collect()
}

/// Fetch a required, non-empty variable.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnvVar`] when the variable is absent or blank.
pub fn required(vars: &EnvVars, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Fetch an optional variable, falling back to `default` when absent or blank.
#[must_use]
pub fn optional(vars: &EnvVars, name: &str, default: &str) -> String {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Parse an optional variable with [`FromStr`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value does not parse.
pub fn parse_or<T>(vars: &EnvVars, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, e.to_string())),
        None => Ok(default),
    }
}

/// Parse an optional boolean flag (`true/false/1/0/yes/no`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for any other spelling.
pub fn parse_bool_or(vars: &EnvVars, name: &str, default: bool) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::invalid(
                name,
                format!("expected a boolean, got '{other}'"),
            )),
        },
    }
}

/// Parse an optional duration variable (see [`parse_duration`]).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value is not a duration.
pub fn duration_or(vars: &EnvVars, name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match vars.get(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => parse_duration(raw).map_err(|reason| ConfigError::invalid(name, reason)),
        None => Ok(default),
    }
}

/// Parse a duration written either as bare seconds (`"900"`) or as a
/// sequence of `<number><unit>` terms (`"15m"`, `"168h"`, `"1h30m"`,
/// `"250ms"`). Units: `ns`, `us`, `ms`, `s`, `m`, `h`.
///
/// # Errors
///
/// Returns a human-readable reason when the input is empty, has an unknown
/// unit, or a term without a number.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("expected a number in '{input}'"));
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number '{number}' in '{input}'"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let unit_secs = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("missing unit in '{input}'")),
            other => return Err(format!("unknown unit '{other}' in '{input}'")),
        };
        let term = Duration::try_from_secs_f64(value * unit_secs)
            .map_err(|e| format!("duration out of range in '{input}': {e}"))?;
        total = total
            .checked_add(term)
            .ok_or_else(|| format!("duration out of range in '{input}'"))?;
        rest = next;
    }

    Ok(total)
}

/// Postgres connection settings.
///
/// `DATABASE_URL` wins when present; otherwise the URL is assembled from
/// `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and `DB_SSLMODE`.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// # Errors
    ///
    /// Fails when neither `DATABASE_URL` nor `DB_NAME` is present, or a pool
    /// size does not parse.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let url = match vars.get("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => url.clone(),
            None => {
                let host = optional(vars, "DB_HOST", "localhost");
                let port: u16 = parse_or(vars, "DB_PORT", 5432)?;
                let user = optional(vars, "DB_USER", "postgres");
                let password = optional(vars, "DB_PASSWORD", "");
                let name = required(vars, "DB_NAME")?;
                let sslmode = optional(vars, "DB_SSLMODE", "disable");
                let credentials = if password.is_empty() {
                    user
                } else {
                    format!("{user}:{password}")
                };
                format!("postgres://{credentials}@{host}:{port}/{name}?sslmode={sslmode}")
            }
        };

        let max_connections: u32 = parse_or(vars, "DB_MAX_OPEN_CONNS", 20)?;
        let min_connections: u32 = parse_or(vars, "DB_MAX_IDLE_CONNS", 2)?;
        if max_connections == 0 {
            return Err(ConfigError::invalid("DB_MAX_OPEN_CONNS", "must be at least 1"));
        }

        Ok(Self {
            url: SecretString::from(url),
            max_connections,
            min_connections: min_connections.min(max_connections),
        })
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .finish()
    }
}

/// Redis connection settings.
#[derive(Clone)]
pub struct RedisConfig {
    pub url: SecretString,
}

impl RedisConfig {
    /// # Errors
    ///
    /// Fails when `REDIS_PORT` or `REDIS_DB` do not parse.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let url = match vars.get("REDIS_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => url.clone(),
            None => {
                let host = optional(vars, "REDIS_HOST", "localhost");
                let port: u16 = parse_or(vars, "REDIS_PORT", 6379)?;
                let db: u32 = parse_or(vars, "REDIS_DB", 0)?;
                let password = optional(vars, "REDIS_PASSWORD", "");
                if password.is_empty() {
                    format!("redis://{host}:{port}/{db}")
                } else {
                    format!("redis://:{password}@{host}:{port}/{db}")
                }
            }
        };

        Ok(Self {
            url: SecretString::from(url),
        })
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &"[REDACTED]")
            .finish()
    }
}

/// Event bus (AMQP) settings.
#[derive(Clone)]
pub struct BusConfig {
    pub url: SecretString,
    pub exchange: String,
}

impl BusConfig {
    /// # Errors
    ///
    /// Fails when `RABBITMQ_URL` is missing or `RABBITMQ_EXCHANGE_TYPE` is
    /// anything but `topic`.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let url = required(vars, "RABBITMQ_URL")?;
        let exchange = optional(vars, "RABBITMQ_EXCHANGE", "lms.events");
        let exchange_type = optional(vars, "RABBITMQ_EXCHANGE_TYPE", EXCHANGE_TYPE_TOPIC);
        if exchange_type != EXCHANGE_TYPE_TOPIC {
            return Err(ConfigError::invalid(
                "RABBITMQ_EXCHANGE_TYPE",
                format!("only '{EXCHANGE_TYPE_TOPIC}' is supported, got '{exchange_type}'"),
            ));
        }

        Ok(Self {
            url: SecretString::from(url),
            exchange,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("url", &"[REDACTED]")
            .field("exchange", &self.exchange)
            .finish()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// # Errors
    ///
    /// Fails when `SHUTDOWN_DRAIN_SECONDS` is not an integer.
    pub fn from_vars(vars: &EnvVars, default_bind: &str) -> Result<Self, ConfigError> {
        let drain_secs: u64 = parse_or(vars, "SHUTDOWN_DRAIN_SECONDS", 10)?;
        Ok(Self {
            bind_address: optional(vars, "BIND_ADDRESS", default_bind),
            drain_timeout: Duration::from_secs(drain_secs),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> EnvVars {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("168h").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_bare_seconds() {
        assert_eq!(parse_duration("900").unwrap(), Duration::from_secs(900));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_ok());
        assert!(parse_duration("15x").is_err());
        assert!(parse_duration("m15").is_err());
        assert!(parse_duration("1.5").is_err());
    }

    #[test]
    fn test_database_url_wins() {
        let config = DatabaseConfig::from_vars(&vars(&[
            ("DATABASE_URL", "postgres://u:p@db/lms"),
            ("DB_HOST", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.url.expose_secret(), "postgres://u:p@db/lms");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
    }

    #[test]
    fn test_database_url_assembled_from_parts() {
        let config = DatabaseConfig::from_vars(&vars(&[
            ("DB_HOST", "pg"),
            ("DB_PORT", "5433"),
            ("DB_USER", "lms"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "auth"),
        ]))
        .unwrap();

        assert_eq!(
            config.url.expose_secret(),
            "postgres://lms:pw@pg:5433/auth?sslmode=disable"
        );
    }

    #[test]
    fn test_database_requires_name_without_url() {
        let result = DatabaseConfig::from_vars(&vars(&[("DB_HOST", "pg")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DB_NAME"));
    }

    #[test]
    fn test_database_debug_redacts_url() {
        let config =
            DatabaseConfig::from_vars(&vars(&[("DATABASE_URL", "postgres://u:hunter2@db/x")]))
                .unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_redis_url_from_parts() {
        let config = RedisConfig::from_vars(&vars(&[
            ("REDIS_HOST", "cache"),
            ("REDIS_PASSWORD", "pw"),
            ("REDIS_DB", "3"),
        ]))
        .unwrap();
        assert_eq!(config.url.expose_secret(), "redis://:pw@cache:6379/3");
    }

    #[test]
    fn test_bus_requires_url() {
        let result = BusConfig::from_vars(&EnvVars::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "RABBITMQ_URL"));
    }

    #[test]
    fn test_bus_defaults_and_topic_only() {
        let config = BusConfig::from_vars(&vars(&[("RABBITMQ_URL", "amqp://guest:guest@mq")]))
            .unwrap();
        assert_eq!(config.exchange, "lms.events");

        let result = BusConfig::from_vars(&vars(&[
            ("RABBITMQ_URL", "amqp://mq"),
            ("RABBITMQ_EXCHANGE_TYPE", "fanout"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name, .. }) if name == "RABBITMQ_EXCHANGE_TYPE"));
    }

    #[test]
    fn test_parse_bool_or() {
        let v = vars(&[("A", "true"), ("B", "0"), ("C", "maybe")]);
        assert!(parse_bool_or(&v, "A", false).unwrap());
        assert!(!parse_bool_or(&v, "B", true).unwrap());
        assert!(parse_bool_or(&v, "C", true).is_err());
        assert!(parse_bool_or(&v, "D", true).unwrap());
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::from_vars(&EnvVars::new(), "0.0.0.0:8081").unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8081");
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
    }
}
