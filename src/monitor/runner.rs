//! The probe cycle loop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::MetricsRegistry;
use crate::probe::{ProbeOutcome, Prober, TargetError};

use super::targets::TargetList;

/// Default pause between cycles (15 seconds).
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(15);

/// What to do when a target line does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidTargetPolicy {
    /// Log it and continue with the next target.
    #[default]
    Skip,
    /// Stop the monitor with [`MonitorError::InvalidTarget`].
    Halt,
}

impl std::str::FromStr for InvalidTargetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "halt" => Ok(Self::Halt),
            other => Err(format!("unknown invalid target policy '{}'", other)),
        }
    }
}

/// Errors that stop the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A malformed target under [`InvalidTargetPolicy::Halt`].
    #[error("monitor halted on invalid target: {0}")]
    InvalidTarget(#[from] TargetError),
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Visiting targets.
    Probing,
    /// Waiting out the period before the next cycle.
    Sleeping,
}

/// Tally of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed: usize,
    pub invalid: usize,
}

/// Loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Pause after each cycle.
    pub period: Duration,
    /// Handling of malformed targets.
    pub invalid_target: InvalidTargetPolicy,
    /// Whether failed probes also contribute their elapsed time.
    pub record_failure_latency: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            invalid_target: InvalidTargetPolicy::default(),
            record_failure_latency: true,
        }
    }
}

impl MonitorOptions {
    /// Set the pause between cycles.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Set the malformed target policy.
    pub fn with_invalid_target(mut self, policy: InvalidTargetPolicy) -> Self {
        self.invalid_target = policy;
        self
    }

    /// Set whether failures record latency.
    pub fn with_failure_latency(mut self, record: bool) -> Self {
        self.record_failure_latency = record;
        self
    }
}

/// Sequential prober over a fixed target list.
///
/// One probe completes before the next starts; the only state shared with
/// the outside world is the [`MetricsRegistry`].
pub struct Monitor<P> {
    targets: TargetList,
    prober: P,
    registry: Arc<MetricsRegistry>,
    options: MonitorOptions,
    state: MonitorState,
}

impl<P: Prober> Monitor<P> {
    pub fn new(
        targets: TargetList,
        prober: P,
        registry: Arc<MetricsRegistry>,
        options: MonitorOptions,
    ) -> Self {
        Self {
            targets,
            prober,
            registry,
            options,
            state: MonitorState::Probing,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn targets(&self) -> &TargetList {
        &self.targets
    }

    /// Probe every target once, in order.
    ///
    /// # Errors
    /// Returns `MonitorError::InvalidTarget` on the first malformed target
    /// when the policy is [`InvalidTargetPolicy::Halt`]; the remaining
    /// targets of the cycle are not probed.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        self.state = MonitorState::Probing;
        let mut report = CycleReport::default();

        for raw in self.targets.iter() {
            let Some(outcome) = self.prober.probe(raw).await else {
                continue;
            };
            self.record(outcome, &mut report)?;
        }

        self.registry.record_cycle();
        tracing::debug!(
            succeeded = report.succeeded,
            failed = report.failed,
            invalid = report.invalid,
            "Probe cycle complete"
        );
        Ok(report)
    }

    /// Run cycles forever, sleeping `period` after each.
    ///
    /// Only returns when a malformed target halts the monitor.
    pub async fn run(mut self) -> Result<(), MonitorError> {
        tracing::info!(
            targets = self.targets.len(),
            period_secs = self.options.period.as_secs(),
            "Monitor started"
        );

        loop {
            self.run_cycle().await?;

            self.state = MonitorState::Sleeping;
            tracing::info!("Sleep for {} sec", self.options.period.as_secs());
            tokio::time::sleep(self.options.period).await;
        }
    }

    fn record(
        &self,
        outcome: ProbeOutcome,
        report: &mut CycleReport,
    ) -> Result<(), MonitorError> {
        match outcome {
            ProbeOutcome::Success {
                target,
                label,
                elapsed_ms,
                status,
            } => {
                tracing::info!(
                    url = %target,
                    label = %label,
                    elapsed_ms = elapsed_ms as u64,
                    status,
                    "Hit target"
                );
                self.registry.observe_latency(&label, elapsed_ms);
                report.succeeded += 1;
            }
            ProbeOutcome::Failure {
                target,
                label,
                elapsed_ms,
                error,
            } => {
                tracing::warn!(
                    url = %target,
                    label = %label,
                    error = %error,
                    "Error hitting target"
                );
                self.registry.increment_error(&label);
                if let Some(ms) = elapsed_ms.filter(|_| self.options.record_failure_latency) {
                    self.registry.observe_latency(&label, ms);
                }
                report.failed += 1;
            }
            ProbeOutcome::Invalid(error) => {
                tracing::error!(error = %error, "Invalid target");
                match self.options.invalid_target {
                    InvalidTargetPolicy::Skip => report.invalid += 1,
                    InvalidTargetPolicy::Halt => return Err(MonitorError::InvalidTarget(error)),
                }
            }
        }
        Ok(())
    }
}

impl<P> std::fmt::Debug for Monitor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("targets", &self.targets.len())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
