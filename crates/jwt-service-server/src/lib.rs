//! # JWT Service Server
//!
//! HTTP front end of the token service: configuration loading, logging setup
//! and the axum routes issuing and validating tokens.
//!
//! ```rust,no_run
//! use jwt_service_server::{ServiceConfig, build_state, router};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_file("config/default.toml")?;
//! config.logging.init()?;
//!
//! let app = router(Arc::new(build_state(&config)?));
//! let listener = tokio::net::TcpListener::bind(config.listen_address()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;

pub use config::{ConfigError, LogFormat, LoggingConfig, ServiceConfig};
pub use error::{ApiError, StartupError};
pub use routes::{AppState, router};

use jwt_service_auth::{KeyResolver, KeyStore, RemoteKeySource, Signer, StaticOfferCatalog, Verifier};
use std::sync::Arc;
use tracing::info;

/// Load keys and wire the signer, verifier and offer catalog
///
/// The signer and verifier share one key store, so remotely fetched keys
/// land next to the configured ones.
///
/// # Errors
///
/// Returns [`StartupError`] if any configured key fails to load or the key
/// service client cannot be built.
pub fn build_state(config: &ServiceConfig) -> Result<AppState, StartupError> {
    let keys = Arc::new(KeyStore::from_config(&config.keys, &config.base_dir)?);

    let signer = Signer::new(Arc::clone(&keys), config.app_id.clone())
        .with_lifetime(config.token_lifetime());

    let mut resolver = KeyResolver::new(keys);
    if let Some(base_url) = &config.marketplace_service {
        let remote = RemoteKeySource::new(base_url, config.key_fetch_timeout())?
            .with_refresh_interval(config.key_refresh_interval());
        info!(url = %remote.config_url(), "Remote key service enabled");
        resolver = resolver.with_remote(remote);
    }

    info!(
        app_id = %config.app_id,
        signing_keys = ?resolver.key_store().signing_key_ids().collect::<Vec<_>>(),
        offers = config.offers.len(),
        "Token service state ready"
    );

    Ok(AppState {
        signer,
        verifier: Verifier::new(resolver),
        offers: Arc::new(StaticOfferCatalog::new(config.offers.clone())),
    })
}
