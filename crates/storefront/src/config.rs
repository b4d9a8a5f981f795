//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `SQLite` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: <http://localhost:3000>)
//! - `STOREFRONT_STATIC_DIR` - Static file root, uploads go to `<dir>/uploads` (default: static)
//! - `STOREFRONT_PAGE_SIZE` - Products per catalog page, 1-100 (default: 8)
//! - `STOREFRONT_MAX_UPLOAD_BYTES` - Body limit for product forms (default: 5 MiB)
//! - `STOREFRONT_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `BAZAAR_ADMIN_PASSWORD` - Password for the bootstrap `admin` account (default: 123456)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

/// Password given to the bootstrap admin when none is configured.
pub const DEFAULT_ADMIN_PASSWORD: &str = "123456";

const DEFAULT_PAGE_SIZE: u32 = 8;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Storefront application configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// `SQLite` database connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Root directory for static files
    pub static_dir: PathBuf,
    /// Number of products per catalog page
    pub page_size: u32,
    /// Maximum request body size for product forms with image uploads
    pub max_upload_bytes: usize,
    /// Log output format
    pub log_format: LogFormat,
    /// Password for the bootstrap admin account
    pub admin_password: SecretString,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("static_dir", &self.static_dir)
            .field("page_size", &self.page_size)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("log_format", &self.log_format)
            .field("admin_password", &"[REDACTED]")
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");
        let static_dir = PathBuf::from(get_env_or_default("STOREFRONT_STATIC_DIR", "static"));

        let page_size: u32 = parse_env("STOREFRONT_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_PAGE_SIZE".to_string(),
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        let max_upload_bytes = parse_env(
            "STOREFRONT_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;
        let log_format = parse_log_format(&get_env_or_default("STOREFRONT_LOG_FORMAT", "pretty"))?;

        let admin_password = SecretString::from(get_env_or_default(
            "BAZAAR_ADMIN_PASSWORD",
            DEFAULT_ADMIN_PASSWORD,
        ));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            static_dir,
            page_size,
            max_upload_bytes,
            log_format,
            admin_password,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for tests and tools: everything defaulted except the database.
    #[must_use]
    pub fn for_database(database_url: &str, static_dir: PathBuf) -> Self {
        Self {
            database_url: SecretString::from(database_url.to_owned()),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: "http://localhost".to_string(),
            static_dir,
            page_size: DEFAULT_PAGE_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            log_format: LogFormat::Pretty,
            admin_password: SecretString::from(DEFAULT_ADMIN_PASSWORD.to_owned()),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Directory where uploaded product images are written.
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.static_dir.join("uploads")
    }

    /// Whether the storefront is served over HTTPS (enables secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_log_format(value: &str) -> Result<LogFormat, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_LOG_FORMAT".to_string(),
            format!("unknown format '{other}' (expected 'pretty' or 'json')"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig::for_database("sqlite::memory:", PathBuf::from("/tmp/static"))
    }

    #[test]
    fn test_socket_addr() {
        let mut config = test_config();
        config.port = 3000;

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_upload_dir_is_under_static_dir() {
        let config = test_config();
        assert_eq!(config.upload_dir(), PathBuf::from("/tmp/static/uploads"));
    }

    #[test]
    fn test_is_secure_follows_base_url() {
        let mut config = test_config();
        assert!(!config.is_secure());
        config.base_url = "https://shop.example.com".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("json").unwrap(), LogFormat::Json);
        assert_eq!(parse_log_format(" Pretty ").unwrap(), LogFormat::Pretty);
        assert!(matches!(
            parse_log_format("xml"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let mut config = test_config();
        config.admin_password = SecretString::from("hunter2-but-longer".to_owned());
        config.database_url = SecretString::from("sqlite://secret-path.db".to_owned());

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-but-longer"));
        assert!(!debug_output.contains("secret-path"));
    }
}
