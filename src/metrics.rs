//! Metrics Layer
//!
//! Latency summaries and error tallies keyed by sanitized host label, plus
//! their Prometheus exposition.
//!
//! # Components
//!
//! - [`Summary`]: sliding-window HdrHistogram quantiles with cumulative count/sum
//! - [`MetricsRegistry`]: concurrent label → (summary, error tally) map
//! - [`Exposition`]: Prometheus text rendering of a registry snapshot

mod exposition;
mod registry;
mod summary;

pub use exposition::{
    BUILD_INFO_METRIC, DURATIONS_METRIC, ERRORS_METRIC, Exposition, ExpositionError, HOST_LABEL,
};
pub use registry::{LabelSnapshot, LatencyObservation, MetricsRegistry, RegistrySnapshot};
pub use summary::{
    DEFAULT_AGE_BUCKETS, DEFAULT_MAX_AGE, DEFAULT_OBJECTIVES, MAX_AGE_BUCKETS, Objective, Summary,
    SummaryOpts, SummarySnapshot,
};
