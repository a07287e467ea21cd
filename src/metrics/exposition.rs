//! Prometheus text exposition of the registry.
//!
//! The `prometheus` crate has no summary type with quantile objectives, so
//! the registry is exposed through a custom [`Collector`] that converts each
//! snapshot into metric families, and the crate's [`TextEncoder`] does the
//! wire format.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

use super::registry::{MetricsRegistry, RegistrySnapshot};

/// Latency summary metric name.
pub const DURATIONS_METRIC: &str = "external_monitor_durations_milliseconds";

/// Error counter metric name.
pub const ERRORS_METRIC: &str = "external_monitor_error_count";

/// Build information gauge name.
pub const BUILD_INFO_METRIC: &str = "external_monitor_build_info";

/// Label carrying the sanitized host.
pub const HOST_LABEL: &str = "host";

const DURATIONS_HELP: &str = "External request monitor latency distributions.";
const ERRORS_HELP: &str = "External request monitor error count.";
const BUILD_INFO_HELP: &str = "External request monitor build information.";

/// Errors while rendering the exposition.
#[derive(Debug, Error)]
pub enum ExpositionError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Encoded output was not UTF-8.
    #[error("invalid exposition encoding: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Adapter exposing a [`MetricsRegistry`] as a Prometheus collector.
struct RegistryCollector {
    metrics: Arc<MetricsRegistry>,
    descs: Vec<Desc>,
}

impl RegistryCollector {
    fn new(metrics: Arc<MetricsRegistry>) -> Result<Self, ExpositionError> {
        let descs = vec![
            Desc::new(
                DURATIONS_METRIC.to_owned(),
                DURATIONS_HELP.to_owned(),
                vec![HOST_LABEL.to_owned()],
                HashMap::new(),
            )?,
            Desc::new(
                ERRORS_METRIC.to_owned(),
                ERRORS_HELP.to_owned(),
                vec![HOST_LABEL.to_owned()],
                HashMap::new(),
            )?,
        ];
        Ok(Self { metrics, descs })
    }
}

impl Collector for RegistryCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        families(&self.metrics.snapshot())
    }
}

/// Convert a snapshot into metric families.
///
/// Labels only appear under a family once they have something to report, so
/// a label that never failed has no error series.
fn families(snapshot: &RegistrySnapshot) -> Vec<MetricFamily> {
    let mut durations = Vec::new();
    let mut errors = Vec::new();

    for (label, entry) in &snapshot.labels {
        if entry.latency.count > 0 {
            let quantiles: Vec<proto::Quantile> = entry
                .latency
                .quantiles
                .iter()
                .map(|&(q, v)| {
                    let mut quantile = proto::Quantile::default();
                    quantile.set_quantile(q);
                    quantile.set_value(v);
                    quantile
                })
                .collect();

            let mut summary = proto::Summary::default();
            summary.set_sample_count(entry.latency.count);
            summary.set_sample_sum(entry.latency.sum);
            summary.set_quantile(quantiles.into());

            let mut metric = proto::Metric::default();
            metric.set_label(vec![host_label(label)].into());
            metric.set_summary(summary);
            durations.push(metric);
        }

        if entry.errors > 0 {
            let mut counter = proto::Counter::default();
            counter.set_value(entry.errors as f64);

            let mut metric = proto::Metric::default();
            metric.set_label(vec![host_label(label)].into());
            metric.set_counter(counter);
            errors.push(metric);
        }
    }

    let mut families = Vec::with_capacity(2);
    if !durations.is_empty() {
        families.push(family(
            DURATIONS_METRIC,
            DURATIONS_HELP,
            MetricType::SUMMARY,
            durations,
        ));
    }
    if !errors.is_empty() {
        families.push(family(ERRORS_METRIC, ERRORS_HELP, MetricType::COUNTER, errors));
    }
    families
}

fn host_label(value: &str) -> proto::LabelPair {
    let mut pair = proto::LabelPair::default();
    pair.set_name(HOST_LABEL.to_owned());
    pair.set_value(value.to_owned());
    pair
}

fn family(
    name: &str,
    help: &str,
    kind: MetricType,
    metrics: Vec<proto::Metric>,
) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(name.to_owned());
    family.set_help(help.to_owned());
    family.set_field_type(kind);
    family.set_metric(metrics.into());
    family
}

/// Prometheus registry wired to a [`MetricsRegistry`].
pub struct Exposition {
    registry: Registry,
    encoder: TextEncoder,
}

impl Exposition {
    /// Register the monitor's collectors.
    ///
    /// # Errors
    /// Returns `ExpositionError::Prometheus` if a descriptor is rejected.
    pub fn new(metrics: Arc<MetricsRegistry>) -> Result<Self, ExpositionError> {
        let registry = Registry::new();
        registry.register(Box::new(RegistryCollector::new(metrics)?))?;

        let build_info = IntGauge::with_opts(
            Opts::new(BUILD_INFO_METRIC, BUILD_INFO_HELP)
                .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        build_info.set(1);
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            encoder: TextEncoder::new(),
        })
    }

    /// Content type of [`Exposition::render`] output.
    pub fn content_type(&self) -> String {
        self.encoder.format_type().to_owned()
    }

    /// Render every registered metric in the text format.
    pub fn render(&self) -> Result<String, ExpositionError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        self.encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for Exposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exposition").finish_non_exhaustive()
    }
}
