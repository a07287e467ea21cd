//! extmon - External Blackbox HTTP Monitor
//!
//! Periodically issues an HTTP GET against every configured target, measures
//! round-trip latency and transport failures, and exposes both as Prometheus
//! metrics labeled by the target's sanitized host.
//!
//! # Architecture
//!
//! - **Probe**: target parsing, host → label sanitizing, timed GET ([`probe`])
//! - **Metrics**: per-label latency summaries and error tallies ([`metrics`])
//! - **Monitor**: sequential probe cycles on a fixed period ([`monitor`])
//! - **Server**: `/metrics` scrape endpoint and health probes ([`server`])
//! - **Config**: YAML configuration with validation ([`config`])
//!
//! The monitor loop and the HTTP server run as independent tasks that share
//! nothing but an `Arc<MetricsRegistry>`.
//!
//! # Example
//!
//! ```rust,no_run
//! use extmon::{HttpProber, MetricsRegistry, Monitor, MonitorOptions, TargetList};
//! use extmon::server::{AppState, create_router};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(MetricsRegistry::default());
//!     let targets = TargetList::parse("https://example.com/\n");
//!     let prober = HttpProber::new(Duration::from_secs(10))?;
//!
//!     let monitor = Monitor::new(targets, prober, Arc::clone(&registry), MonitorOptions::default());
//!     tokio::spawn(monitor.run());
//!
//!     let app = create_router(AppState::new(registry)?);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod server;

pub use config::{AppConfig, ConfigError};
pub use metrics::{MetricsRegistry, RegistrySnapshot};
pub use monitor::{InvalidTargetPolicy, Monitor, MonitorError, MonitorOptions, TargetList};
pub use probe::{HttpProber, ProbeOutcome, Prober, sanitize};
