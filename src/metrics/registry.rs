//! Per-label metric aggregates shared between the monitor and the scraper.
//!
//! Entry creation goes through a sharded concurrent map, so two first writes
//! for the same label always land on a single entry. Each entry guards its
//! summary with its own mutex and keeps the error tally in an atomic; no lock
//! is ever held across more than one entry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::summary::{Summary, SummaryOpts, SummarySnapshot};

/// One latency sample on its way into the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyObservation {
    pub label: String,
    pub elapsed_ms: f64,
    pub observed_at: Instant,
}

impl LatencyObservation {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
            observed_at: Instant::now(),
        }
    }
}

/// Aggregates for one label.
#[derive(Debug)]
struct LabelMetrics {
    latency: Mutex<Summary>,
    errors: AtomicU64,
}

impl LabelMetrics {
    fn new(opts: &SummaryOpts) -> Self {
        Self {
            latency: Mutex::new(Summary::new(opts)),
            errors: AtomicU64::new(0),
        }
    }
}

/// Point-in-time view of one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSnapshot {
    pub latency: SummarySnapshot,
    pub errors: u64,
}

/// Point-in-time view of the whole registry, ordered by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub labels: BTreeMap<String, LabelSnapshot>,
    /// Probe cycles completed when the snapshot was taken.
    pub cycles: u64,
}

impl RegistrySnapshot {
    pub fn get(&self, label: &str) -> Option<&LabelSnapshot> {
        self.labels.get(label)
    }

    /// Total latency samples across all labels.
    pub fn total_samples(&self) -> u64 {
        self.labels.values().map(|l| l.latency.count).sum()
    }

    /// Total error increments across all labels.
    pub fn total_errors(&self) -> u64 {
        self.labels.values().map(|l| l.errors).sum()
    }
}

/// Thread-safe registry of latency summaries and error tallies by label.
#[derive(Debug)]
pub struct MetricsRegistry {
    labels: DashMap<String, Arc<LabelMetrics>>,
    summary_opts: SummaryOpts,
    cycles: AtomicU64,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(SummaryOpts::default())
    }
}

impl MetricsRegistry {
    /// Create an empty registry whose summaries use `summary_opts`.
    pub fn new(summary_opts: SummaryOpts) -> Self {
        Self {
            labels: DashMap::new(),
            summary_opts,
            cycles: AtomicU64::new(0),
        }
    }

    /// Fold one latency sample into `label`'s summary.
    pub fn observe_latency(&self, label: &str, elapsed_ms: f64) {
        self.record(LatencyObservation::new(label, elapsed_ms));
    }

    /// Fold a prepared observation in.
    pub fn record(&self, observation: LatencyObservation) {
        let entry = self.entry(&observation.label);
        entry
            .latency
            .lock()
            .observe_at(observation.elapsed_ms, observation.observed_at);
    }

    /// Increment `label`'s error tally.
    pub fn increment_error(&self, label: &str) {
        self.entry(label).errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark one full probe cycle as finished.
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Release);
    }

    /// Completed probe cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Number of labels seen so far.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Copy out every label's current aggregates.
    ///
    /// Entries are collected first so that no map shard stays locked while
    /// individual summaries are read.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let entries: Vec<(String, Arc<LabelMetrics>)> = self
            .labels
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let labels = entries
            .into_iter()
            .map(|(label, metrics)| {
                let latency = metrics.latency.lock().snapshot();
                let errors = metrics.errors.load(Ordering::Relaxed);
                (label, LabelSnapshot { latency, errors })
            })
            .collect();

        RegistrySnapshot {
            labels,
            cycles: self.cycles(),
        }
    }

    fn entry(&self, label: &str) -> Arc<LabelMetrics> {
        if let Some(existing) = self.labels.get(label) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .labels
            .entry(label.to_owned())
            .or_insert_with(|| Arc::new(LabelMetrics::new(&self.summary_opts)));
        Arc::clone(entry.value())
    }
}
