//! Service configuration
//!
//! Loaded from a TOML, YAML or JSON file and overlaid by environment
//! variables prefixed with `JWT_SERVICE_`. Nested settings use `__`, e.g.
//! `JWT_SERVICE_LOGGING__LEVEL=debug`.
//!
//! ```toml
//! app_id = "my-app"
//! port = 3000
//! marketplace_service = "https://marketplace.example.com"
//!
//! [private_keys.es256_0]
//! algorithm = "ES256"
//! file = "keys/es256_0-priv.pem"
//!
//! [public_keys]
//! es256_0 = "keys/es256_0.pem"
//!
//! [[offers]]
//! id = "offer-1"
//! type = "earn"
//! amount = 10
//! title = "Daily survey"
//! description = "Answer three questions"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use jwt_service_auth::{KeyConfig, OfferRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "JWT_SERVICE";

/// Token service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Issuer placed in every token
    pub app_id: String,
    /// Address to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
    /// Signing and verification keys
    #[serde(flatten)]
    pub keys: KeyConfig,
    /// Base URL of the remote key service
    #[serde(default)]
    pub marketplace_service: Option<String>,
    /// Bound on one remote key fetch
    #[serde(default = "default_key_fetch_timeout_ms")]
    pub key_fetch_timeout_ms: u64,
    /// Minimum spacing between remote key fetches
    #[serde(default = "default_key_refresh_interval_ms")]
    pub key_refresh_interval_ms: u64,
    /// Lifetime of issued tokens
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
    /// Offer catalog
    #[serde(default)]
    pub offers: Vec<OfferRecord>,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory relative key paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_key_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_key_refresh_interval_ms() -> u64 {
    5_000
}

fn default_token_lifetime_secs() -> u64 {
    6 * 60 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

impl ServiceConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `JWT_SERVICE_` prefix override file
    /// settings. Relative key paths are later resolved against the file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, has an unknown
    /// extension, or does not deserialize into a `ServiceConfig`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// See [`ServiceConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut service: Self = config.try_deserialize()?;
        service.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(service)
    }

    /// Socket address to listen on
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Remote key fetch timeout
    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.key_fetch_timeout_ms)
    }

    /// Remote key refresh interval
    pub fn key_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.key_refresh_interval_ms)
    }

    /// Issued token lifetime
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }
}
