//! Logging initialization
//!
//! Logs go to stderr. The configured level is the default filter; `RUST_LOG`
//! replaces it when set.
//!
//! ```rust,no_run
//! use jwt_service_server::LoggingConfig;
//!
//! LoggingConfig::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use crate::config::{LogFormat, LoggingConfig};
use std::io;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

impl LoggingConfig {
    /// Install the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already set.
    pub fn init(&self) -> io::Result<()> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let subscriber = tracing_subscriber::registry().with(filter);

        match self.format {
            LogFormat::Json => subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string())),
            LogFormat::Pretty => subscriber
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
                .map_err(|e| io::Error::other(e.to_string())),
        }
    }
}
