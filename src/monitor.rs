//! Monitor Loop
//!
//! Owns the startup target list and drives the prober over it, one target at
//! a time, feeding every outcome into the shared [`MetricsRegistry`].
//!
//! [`MetricsRegistry`]: crate::metrics::MetricsRegistry
//!
//! # Example
//!
//! ```rust,no_run
//! use extmon::metrics::MetricsRegistry;
//! use extmon::monitor::{Monitor, MonitorOptions, TargetList};
//! use extmon::probe::HttpProber;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MetricsRegistry::default());
//! let targets = TargetList::parse("https://example.com/\nhttps://example.org/\n");
//! let prober = HttpProber::new(Duration::from_secs(10))?;
//! let monitor = Monitor::new(targets, prober, registry, MonitorOptions::default());
//! tokio::spawn(monitor.run());
//! # Ok(())
//! # }
//! ```

mod runner;
mod targets;

pub use runner::{
    CycleReport, DEFAULT_PERIOD, InvalidTargetPolicy, Monitor, MonitorError, MonitorOptions,
    MonitorState,
};
pub use targets::{TargetList, TargetListError};
