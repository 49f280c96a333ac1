use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Where uploaded images end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Stream uploads into an S3 bucket under `original/`
    S3,
    /// Write uploads into the local uploads directory
    Local,
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    // Sessions
    pub cookie_secret: String,
    pub session_cookie_name: String,
    pub session_ttl: Duration,

    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub cors_origin: String,

    // Uploads
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub storage_backend: StorageBackend,

    // S3 Storage
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Sessions
            cookie_secret: required_env("COOKIE_SECRET")?,
            session_cookie_name: env_or_default("SESSION_COOKIE_NAME", "connect.sid"),
            session_ttl: Duration::from_secs(parse_env_u64("SESSION_TTL_SECS", 86_400)?),

            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/nodebird.sqlite",
            )),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 3065)?,
            cors_origin: env_or_default("CORS_ORIGIN", "http://localhost:3060"),

            // Uploads
            uploads_dir: PathBuf::from(env_or_default("UPLOADS_DIR", "uploads")),
            max_upload_bytes: parse_env_usize("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            storage_backend: parse_storage_backend(&env_or_default("STORAGE_BACKEND", "s3"))?,

            // S3 Storage
            s3_bucket: env_or_default("S3_BUCKET", "react-nodebird-gowoonsori"),
            s3_region: env_or_default("S3_REGION", "ap-northeast-2"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            s3_access_key_id: optional_env("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: optional_env("S3_SECRET_ACCESS_KEY"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_secret.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "COOKIE_SECRET".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.session_cookie_name.is_empty()
            || self
                .session_cookie_name
                .contains(|c: char| c == ';' || c == '=' || c.is_whitespace())
        {
            return Err(ConfigError::InvalidValue {
                name: "SESSION_COOKIE_NAME".to_string(),
                message: "must be a non-empty cookie token".to_string(),
            });
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SESSION_TTL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.web_port == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WEB_PORT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_UPLOAD_BYTES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if axum::http::HeaderValue::from_str(&self.cors_origin).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "CORS_ORIGIN".to_string(),
                message: format!("'{}' is not a valid origin", self.cors_origin),
            });
        }
        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: "S3_BUCKET".to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
            if self.s3_access_key_id.is_none() {
                return Err(ConfigError::MissingEnvVar("S3_ACCESS_KEY_ID".to_string()));
            }
            if self.s3_secret_access_key.is_none() {
                return Err(ConfigError::MissingEnvVar(
                    "S3_SECRET_ACCESS_KEY".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("session_cookie_name", &self.session_cookie_name)
            .field("session_ttl", &self.session_ttl)
            .field("database_path", &self.database_path)
            .field("web_host", &self.web_host)
            .field("web_port", &self.web_port)
            .field("cors_origin", &self.cors_origin)
            .field("uploads_dir", &self.uploads_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("storage_backend", &self.storage_backend)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .finish_non_exhaustive()
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_storage_backend(value: &str) -> Result<StorageBackend, ConfigError> {
    match value.to_lowercase().as_str() {
        "s3" => Ok(StorageBackend::S3),
        "local" | "disk" => Ok(StorageBackend::Local),
        _ => Err(ConfigError::InvalidValue {
            name: "STORAGE_BACKEND".to_string(),
            message: format!("must be 's3' or 'local', got '{value}'"),
        }),
    }
}
