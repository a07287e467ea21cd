//! Configuration module for extmon.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Metrics endpoint listen address
//! - Probe cadence and per-request timeout
//! - Malformed target handling
//! - Latency summary objectives and window

mod app;
mod validation;

pub use app::{AppConfig, DEFAULT_LISTEN_ADDRESS, DEFAULT_PERIOD_SECONDS};
pub use validation::{ConfigError, parse_duration, parse_listen_address};
