use common::config::{
    duration_or, optional, parse_bool_or, parse_or, required, ConfigError, DatabaseConfig,
    EnvVars, ServerConfig,
};
use common::secret::SecretString;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Largest accepted upload: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

pub const DEFAULT_PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// S3-compatible object store endpoint (MinIO in deployment).
#[derive(Clone)]
pub struct StorageSettings {
    /// Full endpoint URL including scheme.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: SecretString,
    pub region: String,
}

impl StorageSettings {
    /// `MINIO_ENDPOINT` may be a bare `host:port`; the scheme then follows
    /// `MINIO_USE_SSL`.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let raw = required(vars, "MINIO_ENDPOINT")?;
        let use_ssl = parse_bool_or(vars, "MINIO_USE_SSL", false)?;
        let endpoint = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.trim_end_matches('/').to_string()
        } else {
            let scheme = if use_ssl { "https" } else { "http" };
            format!("{scheme}://{}", raw.trim_end_matches('/'))
        };

        Ok(Self {
            endpoint,
            access_key: required(vars, "MINIO_ACCESS_KEY")?,
            secret_key: SecretString::from(required(vars, "MINIO_SECRET_KEY")?),
            region: optional(vars, "MINIO_REGION", DEFAULT_REGION),
        })
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("region", &self.region)
            .finish()
    }
}

/// Upload limits and download link lifetime.
#[derive(Debug, Clone, Copy)]
pub struct UploadSettings {
    pub max_upload_bytes: u64,
    pub presigned_url_expiry: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            presigned_url_expiry: DEFAULT_PRESIGNED_URL_EXPIRY,
        }
    }
}

impl UploadSettings {
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let max_upload_bytes = parse_or(vars, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            return Err(ConfigError::invalid("MAX_UPLOAD_BYTES", "must be positive"));
        }

        let presigned_url_expiry =
            duration_or(vars, "PRESIGNED_URL_EXPIRY", DEFAULT_PRESIGNED_URL_EXPIRY)?;
        // S3 presigned URLs are capped at seven days.
        if presigned_url_expiry.is_zero() || presigned_url_expiry > Duration::from_secs(7 * 24 * 3600) {
            return Err(ConfigError::invalid(
                "PRESIGNED_URL_EXPIRY",
                "must be between 1s and 168h",
            ));
        }

        Ok(Self {
            max_upload_bytes,
            presigned_url_expiry,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageSettings,
    pub uploads: UploadSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&common::config::env_vars())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_vars(vars, "0.0.0.0:8085")?,
            database: DatabaseConfig::from_vars(vars)?,
            storage: StorageSettings::from_vars(vars)?,
            uploads: UploadSettings::from_vars(vars)?,
        })
    }
}
