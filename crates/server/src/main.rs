use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logdrop_core::{
    load_config, load_config_from_env, validate_config, Config, Placer, PlacerConfig,
    UploadPlacer,
};
use logdrop_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `LOGDROP_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,tower_http=debug".into()),
    );
    if json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("logdrop {} starting", VERSION);

    let config = read_config()?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    match &config.storage.default_root {
        Some(root) => info!("Default storage root: {:?}", root),
        None => info!("No default storage root, uploads fall back to the working directory"),
    }

    let placer = UploadPlacer::new(PlacerConfig::from(&config.storage));
    placer
        .validate()
        .await
        .context("Storage configuration is unusable")?;
    info!("Using placer: {}", placer.name());

    let state = Arc::new(AppState::new(config.clone(), Arc::new(placer)));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Peer addresses feed the request log
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// `LOGDROP_LOG_FORMAT=json` switches to one JSON object per line.
fn json_logs() -> bool {
    std::env::var("LOGDROP_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Reads the config file named by `LOGDROP_CONFIG`.
///
/// A missing file is only tolerated for the default path, in which case the
/// service runs on built-in defaults plus environment overrides.
fn read_config() -> Result<Config> {
    let explicit = std::env::var_os("LOGDROP_CONFIG").map(PathBuf::from);
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if explicit.is_none() && !config_path.exists() {
        info!(
            "No {:?} found, using defaults and environment overrides",
            config_path
        );
        return load_config_from_env().context("Failed to load config from environment");
    }

    info!("Loading configuration from {:?}", config_path);
    load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
