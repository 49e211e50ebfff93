//! Decoy - HTTP server with runtime request overrides

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::try_join_all;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, ListenerConfig, LoggingConfig};
use decoy_api::{AppState, MetricsHandle, create_router};
use decoy_core::{OverrideHost, OverrideSpec, Registry};

/// Decoy - serve HTTP with declaratively overridable responses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "DECOY_CONFIG")]
    config: String,

    /// Bind address applied to every listener
    #[arg(long, env = "DECOY_BIND")]
    bind: Option<String>,

    /// Log level, overrides the config file
    #[arg(long, env = "DECOY_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(bind) = args.bind {
        for listener in &mut config.listeners {
            listener.bind_address = bind.clone();
        }
    }

    init_logging(&config.logging);

    info!("Starting Decoy v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let host = OverrideHost::new();
    let states: Vec<(ListenerConfig, AppState)> = config
        .listeners
        .iter()
        .map(|listener| {
            let registry = if listener.intercept {
                host.attach(listener.name.clone())
            } else {
                Arc::new(Registry::new())
            };
            let state = AppState::new(listener.name.clone(), registry, listener.intercept);
            (listener.clone(), state)
        })
        .collect();

    for entry in &config.overrides {
        let label = entry.describe();
        let id = host
            .register(OverrideSpec::from(entry.clone()))
            .with_context(|| format!("Failed to register configured override {}", label))?;
        info!("Configured override {} installed as {}", label, id);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let timeout = Duration::from_secs(config.server.request_timeout_secs);

    let servers = states.into_iter().map(|(listener, state)| {
        serve_listener(
            listener,
            state,
            metrics_handle.clone(),
            timeout,
            shutdown_rx.clone(),
        )
    });

    let shutdown = tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    try_join_all(servers).await?;
    shutdown.abort();

    info!("Server stopped");
    Ok(())
}

/// Bind and serve one listener until shutdown
#[allow(deprecated)]
async fn serve_listener(
    listener: ListenerConfig,
    state: AppState,
    metrics_handle: Option<Arc<MetricsHandle>>,
    timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr: SocketAddr = listener
        .address()
        .parse()
        .with_context(|| format!("Invalid address for listener '{}'", listener.name))?;

    let app = create_router(state, metrics_handle)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind listener '{}' on {}", listener.name, addr))?;

    info!(
        "Listener '{}' on {} (intercept: {})",
        listener.name, addr, listener.intercept
    );

    axum::serve(tcp, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .with_context(|| format!("Listener '{}' failed", listener.name))?;

    info!("Listener '{}' stopped", listener.name);
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
