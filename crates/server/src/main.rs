//! Satchel server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use satchel_core::AppConfig;
use satchel_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Satchel - a StandardFile synchronization server
#[derive(Parser, Debug)]
#[command(name = "satcheld")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SATCHEL_CONFIG", default_value = "satchel.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Satchel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("SATCHEL_") && key != "SATCHEL_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: satcheld --config /path/to/satchel.toml\n  \
             2. Environment variables: SATCHEL_ADDRESS=127.0.0.1:5000 \
             SATCHEL_SECRET_KEY=... SATCHEL_SESSION__SECRET=... satcheld\n\n\
             Set SATCHEL_CONFIG to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SATCHEL_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize the store
    let store = satchel_store::open(&config.database_path)
        .await
        .context("failed to open database")?;
    store
        .health_check()
        .await
        .context("database health check failed")?;
    tracing::info!(path = %config.database_path.display(), "Store initialized");

    let socket_mode = config.socket_mode;
    let address = config.address.clone();

    let state = AppState::new(config, store).context("invalid configuration")?;
    let app = create_router(state);

    if socket_mode {
        // Stale socket files survive crashes; rebinding needs them gone.
        let _ = std::fs::remove_file(&address);
        let listener = tokio::net::UnixListener::bind(&address)
            .with_context(|| format!("failed to bind unix socket {address}"))?;
        tracing::info!("Listening on unix socket {}", address);
        axum::serve(listener, app.into_make_service()).await?;
    } else {
        let addr: SocketAddr = address.parse().context("invalid bind address")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;
        tracing::info!("Listening on {}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}
