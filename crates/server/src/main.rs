use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swarmcast_core::{
    build_crawlers, load_config, load_config_from_env, validate_config, Aggregator,
    ContentResolver, FfmpegTranscoder, LibrqbitEngine, SessionManager, StreamTool,
    StreamlinkTool, SwarmEngine, Transcoder,
};
use swarmcast_server::api::create_router;
use swarmcast_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SWARMCAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // A missing file is fine: defaults plus SWARMCAST_* overrides.
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file at {:?}, using defaults and environment", config_path);
        load_config_from_env().context("Failed to load config from environment")?
    };

    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");

    // Discovery
    let crawlers = build_crawlers(&config.crawlers).context("Failed to build crawlers")?;
    info!(
        sources = ?crawlers.iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
        "Crawlers initialized"
    );
    let aggregator = Arc::new(Aggregator::new(crawlers, config.search.clone()));

    // Streaming
    let engine: Arc<dyn SwarmEngine> = Arc::new(
        LibrqbitEngine::new(&config.swarm)
            .await
            .context("Failed to initialize swarm engine")?,
    );
    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::new(config.transcoder.clone()));
    let resolver: Arc<dyn ContentResolver> = aggregator.clone();
    let sessions = SessionManager::new(
        resolver,
        Arc::clone(&engine),
        transcoder,
        Duration::from_secs(config.swarm.join_timeout_secs),
    );

    let stream_tool: Arc<dyn StreamTool> = Arc::new(StreamlinkTool::new(config.player.clone()));

    let state = Arc::new(AppState::new(
        config.clone(),
        aggregator,
        Arc::clone(&sessions),
        Arc::clone(&engine),
        Arc::clone(&stream_tool),
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Live streams hold their connections open, so sessions are ended as soon
    // as the signal arrives rather than after connections drain.
    let shutdown_sessions = Arc::clone(&sessions);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, ending sessions...");
            shutdown_sessions.shutdown_all().await;
        })
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    stream_tool.shutdown_all().await;
    engine.shutdown().await;
    info!("Swarm engine stopped");

    Ok(())
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
