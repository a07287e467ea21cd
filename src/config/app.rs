//! Application configuration structures.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::{MAX_AGE_BUCKETS, SummaryOpts};
use crate::monitor::{InvalidTargetPolicy, MonitorOptions};
use crate::probe::http::DEFAULT_TIMEOUT;

use super::validation::{ConfigError, parse_listen_address};

// =============================================================================
// Constants
// =============================================================================

/// Default listen address for the metrics endpoint.
pub const DEFAULT_LISTEN_ADDRESS: &str = ":8080";

/// Default seconds between probe cycles.
pub const DEFAULT_PERIOD_SECONDS: u64 = 15;

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
///
/// Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Address the metrics endpoint binds (default: ":8080").
    pub listen_address: String,

    /// Seconds to wait after each probe cycle (default: 15).
    pub period_seconds: u64,

    /// Per-request timeout (default: 10s).
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Handling of malformed targets (default: skip).
    pub invalid_target: InvalidTargetPolicy,

    /// Whether failed probes also record their latency (default: true).
    pub record_failure_latency: bool,

    /// Latency summary options.
    pub summary: SummaryOpts,

    /// Target list file; standard input when unset.
    pub targets: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            period_seconds: DEFAULT_PERIOD_SECONDS,
            probe_timeout: DEFAULT_TIMEOUT,
            invalid_target: InvalidTargetPolicy::default(),
            record_failure_latency: true,
            summary: SummaryOpts::default(),
            targets: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// # Errors
    /// Returns `ConfigError` if the text cannot be parsed or validated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.period_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "period_seconds must be positive".to_string(),
            ));
        }

        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "probe_timeout must be non-zero".to_string(),
            ));
        }

        if self.summary.objectives.is_empty() {
            return Err(ConfigError::ValidationError(
                "summary.objectives must not be empty".to_string(),
            ));
        }

        for objective in &self.summary.objectives {
            if !(objective.quantile > 0.0 && objective.quantile < 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "summary objective quantile {} must be in (0, 1)",
                    objective.quantile
                )));
            }
            if !(objective.error > 0.0 && objective.error < 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "summary objective error {} must be in (0, 1)",
                    objective.error
                )));
            }
        }

        if self.summary.max_age.is_zero() {
            return Err(ConfigError::ValidationError(
                "summary.max_age must be non-zero".to_string(),
            ));
        }

        if self.summary.age_buckets == 0 || self.summary.age_buckets > MAX_AGE_BUCKETS {
            return Err(ConfigError::ValidationError(format!(
                "summary.age_buckets must be between 1 and {}",
                MAX_AGE_BUCKETS
            )));
        }

        if self.summary.bucket_duration() < Duration::from_millis(1) {
            return Err(ConfigError::ValidationError(format!(
                "summary.max_age {:?} is too short for {} age_buckets",
                self.summary.max_age, self.summary.age_buckets
            )));
        }

        Ok(())
    }

    /// Parsed listen address.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if the address is invalid.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.listen_address).map_err(ConfigError::ValidationError)
    }

    /// Pause between probe cycles.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }

    /// Loop options derived from this configuration.
    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions::default()
            .with_period(self.period())
            .with_invalid_target(self.invalid_target)
            .with_failure_latency(self.record_failure_latency)
    }
}
