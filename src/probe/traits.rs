//! Core prober trait and outcome types.

use std::time::{Duration, Instant};

use thiserror::Error;

use super::target::{ParsedTarget, TargetError};

/// Transport-level failures of a single probe.
///
/// HTTP status codes are never errors here: any response counts as reachable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// No response arrived within the probe timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established (refused, DNS, TLS handshake).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure while sending or receiving.
    #[error("request failed: {0}")]
    Transport(String),

    /// The request could not be constructed; nothing was sent.
    #[error("failed to build request: {0}")]
    Build(String),
}

impl ProbeError {
    /// Whether the request left the process, so elapsed time means something.
    pub fn was_sent(&self) -> bool {
        !matches!(self, Self::Build(_))
    }
}

/// Result of probing one target.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// A response was received, whatever its status.
    Success {
        target: String,
        label: String,
        elapsed_ms: f64,
        status: u16,
    },

    /// The transport failed.
    Failure {
        target: String,
        label: String,
        elapsed_ms: Option<f64>,
        error: ProbeError,
    },

    /// The target could not be parsed into a probe-able URL.
    Invalid(TargetError),
}

impl ProbeOutcome {
    /// The metric label this outcome belongs to, if the target parsed.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Success { label, .. } | Self::Failure { label, .. } => Some(label),
            Self::Invalid(_) => None,
        }
    }
}

/// A request prober.
///
/// Implementors only provide [`Prober::fetch`]; trimming, parsing, labeling
/// and timing are shared by the provided [`Prober::probe`].
#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Issue one GET against a validated target.
    ///
    /// Returns the HTTP status on any response, or a [`ProbeError`] when the
    /// transport failed. The response must be released before returning.
    async fn fetch(&self, target: &ParsedTarget) -> Result<u16, ProbeError>;

    /// Probe one raw target line.
    ///
    /// Returns `None` for lines that are blank after trimming.
    async fn probe(&self, raw: &str) -> Option<ProbeOutcome> {
        let target = match ParsedTarget::parse(raw) {
            Ok(Some(target)) => target,
            Ok(None) => return None,
            Err(e) => return Some(ProbeOutcome::Invalid(e)),
        };

        let start = Instant::now();
        let result = self.fetch(&target).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let outcome = match result {
            Ok(status) => ProbeOutcome::Success {
                target: target.as_str().to_owned(),
                label: target.label().to_owned(),
                elapsed_ms,
                status,
            },
            Err(error) => ProbeOutcome::Failure {
                target: target.as_str().to_owned(),
                label: target.label().to_owned(),
                elapsed_ms: error.was_sent().then_some(elapsed_ms),
                error,
            },
        };
        Some(outcome)
    }
}
