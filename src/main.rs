//! extmon Binary Entry Point
//!
//! Reads the target list, starts the probe loop and serves `/metrics`.
//! Core functionality is provided by the `extmon` library crate.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use extmon::{
    config::{AppConfig, parse_duration},
    metrics::MetricsRegistry,
    monitor::{InvalidTargetPolicy, Monitor, MonitorError, TargetList},
    probe::HttpProber,
    server::{AppState, create_router},
};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// extmon - External blackbox HTTP monitor
#[derive(Parser, Debug)]
#[command(name = "extmon", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "EXTMON_CONFIG")]
    config: Option<PathBuf>,

    /// The address to listen on for HTTP requests (overrides config file)
    #[arg(long, env = "EXTMON_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// The number of seconds to wait between request cycles (overrides config file)
    #[arg(long, env = "EXTMON_PERIOD")]
    period: Option<u64>,

    /// Per-request timeout, e.g. "10s" (overrides config file)
    #[arg(long, env = "EXTMON_PROBE_TIMEOUT", value_parser = parse_duration)]
    probe_timeout: Option<Duration>,

    /// File with one target URL per line; standard input when omitted
    #[arg(long, env = "EXTMON_TARGETS")]
    targets: Option<PathBuf>,

    /// What to do with malformed targets: "skip" or "halt" (overrides config file)
    #[arg(long, env = "EXTMON_INVALID_TARGET")]
    invalid_target: Option<InvalidTargetPolicy>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,extmon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration; every field has a default
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(addr) = cli.listen_address {
        config.listen_address = addr;
    }
    if let Some(period) = cli.period {
        config.period_seconds = period;
    }
    if let Some(timeout) = cli.probe_timeout {
        config.probe_timeout = timeout;
    }
    if let Some(policy) = cli.invalid_target {
        config.invalid_target = policy;
    }
    if let Some(path) = cli.targets {
        config.targets = Some(path);
    }
    config.validate()?;

    let addr: SocketAddr = config.socket_addr()?;
    tracing::info!(
        "Listen: {}, period: {}s, probe timeout: {:?}, invalid targets: {:?}",
        addr,
        config.period_seconds,
        config.probe_timeout,
        config.invalid_target,
    );

    let targets = load_targets(config.targets.clone()).await?;
    tracing::info!("Loaded {} targets", targets.len());
    for error in targets.invalid() {
        tracing::warn!(error = %error, "Target will not be probed");
    }

    // Shared registry: the monitor writes, the server reads
    let registry = Arc::new(MetricsRegistry::new(config.summary.clone()));

    let prober = HttpProber::new(config.probe_timeout)?;
    let monitor = Monitor::new(
        targets,
        prober,
        Arc::clone(&registry),
        config.monitor_options(),
    );
    let mut monitor_handle: JoinHandle<Result<(), MonitorError>> = tokio::spawn(monitor.run());

    let app = create_router(AppState::new(registry)?);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics available at: http://{}/metrics", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    tokio::select! {
        result = server => {
            result?;
        }
        result = &mut monitor_handle => {
            match result {
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Monitor stopped");
                    return Err(e.into());
                }
                Ok(Ok(())) => tracing::warn!("Monitor exited"),
                Err(e) => {
                    tracing::error!(error = %e, "Monitor task failed");
                    return Err(e.into());
                }
            }
        }
    }

    monitor_handle.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Read the target list from a file, or from standard input.
async fn load_targets(path: Option<PathBuf>) -> Result<TargetList, Box<dyn std::error::Error>> {
    let targets = match path {
        Some(path) => {
            tracing::info!("Reading targets from: {}", path.display());
            TargetList::from_path(&path)?
        }
        None => {
            tracing::info!("Reading targets from standard input");
            tokio::task::spawn_blocking(|| TargetList::from_reader(std::io::stdin().lock()))
                .await??
        }
    };
    Ok(targets)
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping monitor...");
}
