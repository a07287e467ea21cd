//! Sliding-window latency summary.
//!
//! Quantiles cover the last `max_age` of observations, using `age_buckets`
//! overlapping HdrHistograms that are reset one at a time. Count, sum and
//! max are cumulative for the lifetime of the summary.

use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Default quantile window (10 minutes).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

/// Default number of rotating histograms in the window.
pub const DEFAULT_AGE_BUCKETS: u32 = 5;

/// Upper bound on `age_buckets`; each bucket owns a full histogram.
pub const MAX_AGE_BUCKETS: u32 = 60;

/// Default objectives: median, p90 and p99.
pub const DEFAULT_OBJECTIVES: [Objective; 3] = [
    Objective::new(0.5, 0.05),
    Objective::new(0.9, 0.01),
    Objective::new(0.99, 0.001),
];

// Histogram range in microseconds: 1µs .. 1h, values within 0.1%.
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 3_600_000_000;
const HIST_SIGFIG: u8 = 3;

const MICROS_PER_MILLI: f64 = 1_000.0;

/// One quantile target with its allowed rank error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Quantile in `(0, 1)`, e.g. `0.99`.
    pub quantile: f64,
    /// Absolute rank error, e.g. `0.001`.
    pub error: f64,
}

impl Objective {
    pub const fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }
}

fn default_objectives() -> Vec<Objective> {
    DEFAULT_OBJECTIVES.to_vec()
}

fn default_max_age() -> Duration {
    DEFAULT_MAX_AGE
}

fn default_age_buckets() -> u32 {
    DEFAULT_AGE_BUCKETS
}

/// Summary construction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryOpts {
    /// Quantile objectives (default: 0.5±0.05, 0.9±0.01, 0.99±0.001).
    #[serde(default = "default_objectives")]
    pub objectives: Vec<Objective>,
    /// Quantile window (default: 10m).
    #[serde(default = "default_max_age", with = "humantime_serde")]
    pub max_age: Duration,
    /// Histograms per window (default: 5).
    #[serde(default = "default_age_buckets")]
    pub age_buckets: u32,
}

impl Default for SummaryOpts {
    fn default() -> Self {
        Self {
            objectives: default_objectives(),
            max_age: DEFAULT_MAX_AGE,
            age_buckets: DEFAULT_AGE_BUCKETS,
        }
    }
}

impl SummaryOpts {
    /// Set the quantile objectives.
    pub fn with_objectives(mut self, objectives: Vec<Objective>) -> Self {
        self.objectives = objectives;
        self
    }

    /// Set the quantile window.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the number of rotating histograms.
    pub fn with_age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets;
        self
    }

    /// How long each bucket stays at the head of the window.
    pub fn bucket_duration(&self) -> Duration {
        self.max_age / self.age_buckets.max(1)
    }
}

/// Point-in-time view of one summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    /// Total observations.
    pub count: u64,
    /// Sum of all observations.
    pub sum: f64,
    /// Largest observation, if any.
    pub max: Option<f64>,
    /// `(quantile, value)` pairs; NaN when the window is empty.
    pub quantiles: Vec<(f64, f64)>,
}

impl SummarySnapshot {
    /// Value for quantile `q`, if it is one of the objectives.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        self.quantiles
            .iter()
            .find(|(quantile, _)| *quantile == q)
            .map(|(_, value)| *value)
    }
}

/// Latency summary with windowed quantiles, in milliseconds.
#[derive(Clone)]
pub struct Summary {
    objectives: Vec<Objective>,
    buckets: Vec<Histogram<u64>>,
    head: usize,
    head_expires: Instant,
    bucket_duration: Duration,
    max_age: Duration,
    count: u64,
    sum: f64,
    max: Option<f64>,
}

impl Summary {
    pub fn new(opts: &SummaryOpts) -> Self {
        Self::new_at(opts, Instant::now())
    }

    pub(crate) fn new_at(opts: &SummaryOpts, now: Instant) -> Self {
        let buckets = opts.age_buckets.clamp(1, MAX_AGE_BUCKETS);
        let max_age = opts.max_age.max(Duration::from_millis(1));
        // A zero rotation step would never advance the head.
        let bucket_duration = (max_age / buckets).max(Duration::from_micros(1));

        Self {
            objectives: opts.objectives.clone(),
            buckets: (0..buckets).map(|_| new_histogram()).collect(),
            head: 0,
            head_expires: now + bucket_duration,
            bucket_duration,
            max_age,
            count: 0,
            sum: 0.0,
            max: None,
        }
    }

    /// Fold one observation in, in milliseconds.
    pub fn observe(&mut self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    pub(crate) fn observe_at(&mut self, value: f64, now: Instant) {
        if value.is_nan() {
            return;
        }
        self.rotate(now);

        let micros = (value.max(0.0) * MICROS_PER_MILLI).round() as u64;
        for bucket in &mut self.buckets {
            bucket.saturating_record(micros);
        }
        self.count += 1;
        self.sum += value;
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Current count, sum, max and windowed quantiles.
    pub fn snapshot(&mut self) -> SummarySnapshot {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn snapshot_at(&mut self, now: Instant) -> SummarySnapshot {
        self.rotate(now);
        let head = &self.buckets[self.head];
        let quantiles = self
            .objectives
            .iter()
            .map(|o| {
                let value = match self.max {
                    // Bucket boundaries may round past the largest sample.
                    Some(max) if head.len() > 0 => {
                        (head.value_at_quantile(o.quantile) as f64 / MICROS_PER_MILLI).min(max)
                    }
                    _ => f64::NAN,
                };
                (o.quantile, value)
            })
            .collect();

        SummarySnapshot {
            count: self.count,
            sum: self.sum,
            max: self.max,
            quantiles,
        }
    }

    /// Retire buckets whose window has passed.
    fn rotate(&mut self, now: Instant) {
        if now < self.head_expires {
            return;
        }

        // Idle for a whole window: everything is stale.
        if now.duration_since(self.head_expires) >= self.max_age {
            for bucket in &mut self.buckets {
                bucket.reset();
            }
            self.head_expires = now + self.bucket_duration;
            return;
        }

        while now >= self.head_expires {
            self.buckets[self.head].reset();
            self.head = (self.head + 1) % self.buckets.len();
            self.head_expires += self.bucket_duration;
        }
    }
}

impl std::fmt::Debug for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summary")
            .field("buckets", &self.buckets.len())
            .field("bucket_duration", &self.bucket_duration)
            .field("count", &self.count)
            .field("sum", &self.sum)
            .finish_non_exhaustive()
    }
}

fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        .expect("histogram creation")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> SummaryOpts {
        SummaryOpts::default()
            .with_max_age(Duration::from_secs(50))
            .with_age_buckets(5)
    }

    /// HdrHistogram with 3 significant digits is within 0.1% of the input.
    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("quantile missing");
        assert!(
            (actual - expected).abs() <= expected * 0.001,
            "expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn test_summary_opts_defaults() {
        let opts = SummaryOpts::default();
        assert_eq!(opts.objectives, DEFAULT_OBJECTIVES.to_vec());
        assert_eq!(opts.max_age, DEFAULT_MAX_AGE);
        assert_eq!(opts.age_buckets, DEFAULT_AGE_BUCKETS);
        assert_eq!(opts.bucket_duration(), Duration::from_secs(120));
    }

    #[test]
    fn test_empty_summary_has_nan_quantiles() {
        let mut summary = Summary::new(&opts());
        let snapshot = summary.snapshot();
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.sum, 0.0);
        assert_eq!(snapshot.max, None);
        assert_eq!(snapshot.quantiles.len(), 3);
        assert!(snapshot.quantile(0.5).unwrap().is_nan());
        assert_eq!(snapshot.quantile(0.75), None);
    }

    #[test]
    fn test_summary_counts_and_quantiles() {
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts(), start);
        for v in 1..=100 {
            summary.observe_at(v as f64, start);
        }

        let snapshot = summary.snapshot_at(start);
        assert_eq!(snapshot.count, 100);
        assert_eq!(snapshot.sum, 5050.0);
        assert_eq!(snapshot.max, Some(100.0));
        assert_close(snapshot.quantile(0.5), 50.0);
        assert_close(snapshot.quantile(0.9), 90.0);
        assert_close(snapshot.quantile(0.99), 99.0);
    }

    #[test]
    fn test_small_values_are_exact() {
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts(), start);
        for v in [1.5, 0.25, 2.0] {
            summary.observe_at(v, start);
        }

        let snapshot = summary.snapshot_at(start);
        assert_eq!(snapshot.quantile(0.5), Some(1.5));
        assert_eq!(snapshot.quantile(0.99), Some(2.0));
    }

    #[test]
    fn test_rank_error_within_objectives() {
        let n: u64 = 10_000;
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts(), start);
        // Deterministic permutation of 1..=n milliseconds.
        for i in 0..n {
            summary.observe_at(((i * 7919) % n + 1) as f64, start);
        }

        let snapshot = summary.snapshot_at(start);
        for objective in DEFAULT_OBJECTIVES {
            let estimate = snapshot.quantile(objective.quantile).unwrap();
            let expected = objective.quantile * n as f64;
            // Values equal ranks here, so rank error is value error.
            let tolerance = objective.error * n as f64;
            assert!(
                (estimate - expected).abs() <= tolerance,
                "q={} estimate={} expected={} tolerance={}",
                objective.quantile,
                estimate,
                expected,
                tolerance
            );
        }
    }

    #[test]
    fn test_quantiles_slide_out_of_window() {
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts(), start);
        summary.observe_at(1_000.0, start);

        // Still inside the window: the early sample is visible.
        let mid = start + Duration::from_secs(30);
        summary.observe_at(10.0, mid);
        assert_close(summary.snapshot_at(mid).quantile(0.99), 1_000.0);

        // After max_age the early sample has rotated out of every bucket.
        let late = start + Duration::from_secs(55);
        let snapshot = summary.snapshot_at(late);
        assert_close(snapshot.quantile(0.99), 10.0);
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.max, Some(1_000.0));
    }

    #[test]
    fn test_long_idle_resets_window() {
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts(), start);
        summary.observe_at(5.0, start);

        let later = start + Duration::from_secs(3_600);
        let snapshot = summary.snapshot_at(later);
        assert!(snapshot.quantile(0.5).unwrap().is_nan());
        assert_eq!(snapshot.count, 1);

        summary.observe_at(7.0, later);
        assert_close(summary.snapshot_at(later).quantile(0.5), 7.0);
    }

    #[test]
    fn test_oversized_bucket_count_still_rotates() {
        let opts = SummaryOpts::default()
            .with_max_age(Duration::from_nanos(1))
            .with_age_buckets(2_000_000);
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts, start);
        assert_eq!(summary.buckets.len(), MAX_AGE_BUCKETS as usize);

        summary.observe_at(3.0, start);
        let later = start + Duration::from_micros(500);
        summary.observe_at(4.0, later);
        let snapshot = summary.snapshot_at(later);
        assert_eq!(snapshot.count, 2);
        assert!(snapshot.quantile(0.5).is_some());
    }

    #[test]
    fn test_negative_and_huge_values_saturate() {
        let start = Instant::now();
        let mut summary = Summary::new_at(&opts(), start);
        summary.observe_at(-1.0, start);
        summary.observe_at(1.0e12, start);

        let snapshot = summary.snapshot_at(start);
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.quantile(0.5), Some(0.0));
        assert!(snapshot.quantile(0.99).unwrap() <= HIST_HIGH as f64 / MICROS_PER_MILLI * 1.001);
    }
}
