//! jwt-service entry point

use anyhow::Context;
use clap::Parser;
use jwt_service_server::{ServiceConfig, build_state, router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Token service issuing and validating rotating-key JWTs
#[derive(Debug, Parser)]
#[command(name = "jwt-service", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(
        long,
        short,
        value_name = "PATH",
        env = "JWT_SERVICE_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    /// Port to listen on, overriding the configuration
    #[arg(long, short, value_name = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    config.logging.init().context("initializing logging")?;

    let state = build_state(&config).context("building service state")?;
    let app = router(Arc::new(state));

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;

    info!(address = %address, "Token service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Token service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, initiating shutdown");
}
