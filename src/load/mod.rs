//! # Load probing
//!
//! Latency statistics over a set of outcomes, and a burst helper that fires
//! the same request many times at once.

use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use tracing::info;

use crate::error::{AssertionFailure, FailureReport, HarnessError};
use crate::http::client::Executor;
use crate::http::request::RequestSpec;
use crate::http::response::ResponseOutcome;

const MAX_TRACKED_LATENCY_US: u64 = 60_000_000;

#[derive(Default)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count as f64 - 1.0)).sqrt()
    }
}

fn round_to_3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Latency distribution of a batch, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    histogram: Option<Histogram<u64>>,
}

impl LatencySummary {
    pub fn from_outcomes(outcomes: &[ResponseOutcome]) -> Result<Self, HarnessError> {
        Self::from_durations(outcomes.iter().map(|outcome| outcome.elapsed))
    }

    pub fn from_durations(durations: impl IntoIterator<Item = Duration>) -> Result<Self, HarnessError> {
        let mut stats = RunningStats::default();
        let mut histogram = Histogram::<u64>::new_with_bounds(1, MAX_TRACKED_LATENCY_US, 3)
            .map_err(|err| HarnessError::Config(format!("Failed to initialize latency histogram: {err}")))?;

        for elapsed in durations {
            let latency_ms = elapsed.as_secs_f64() * 1000.0;
            stats.add(latency_ms);
            let latency_us = (elapsed.as_micros() as u64).clamp(1, MAX_TRACKED_LATENCY_US);
            histogram
                .record(latency_us)
                .map_err(|err| HarnessError::Config(format!("Failed to record latency: {err}")))?;
        }

        if stats.count == 0 {
            return Ok(Self::default());
        }

        let quantile_ms = |q: f64| round_to_3(histogram.value_at_quantile(q) as f64 / 1000.0);
        Ok(Self {
            count: stats.count,
            min_ms: round_to_3(stats.min),
            avg_ms: round_to_3(stats.mean),
            max_ms: round_to_3(stats.max),
            stddev_ms: round_to_3(stats.stddev()),
            p50_ms: quantile_ms(0.50),
            p90_ms: quantile_ms(0.90),
            p95_ms: quantile_ms(0.95),
            p99_ms: quantile_ms(0.99),
            histogram: Some(histogram),
        })
    }

    /// Latency at `percentile`, read from the recorded histogram. `None` above 100.
    /// An empty batch answers zero for every percentile.
    pub fn percentile_ms(&self, percentile: u8) -> Option<f64> {
        if percentile > 100 {
            return None;
        }
        let Some(histogram) = &self.histogram else {
            return Some(0.0);
        };
        Some(round_to_3(
            histogram.value_at_percentile(f64::from(percentile)) as f64 / 1000.0,
        ))
    }
}

/// Fails when the given percentile of the batch exceeds `bound`.
pub fn assert_percentile_within(
    summary: &LatencySummary,
    label: &str,
    percentile: u8,
    bound: Duration,
) -> Result<(), AssertionFailure> {
    let observed_ms = summary
        .percentile_ms(percentile)
        .ok_or_else(|| AssertionFailure::UnknownPercentile {
            request: label.to_string(),
            percentile,
        })?;
    let bound_ms = bound.as_secs_f64() * 1000.0;
    if observed_ms <= bound_ms {
        return Ok(());
    }
    Err(AssertionFailure::LatencyExceeded {
        request: format!("{label} p{percentile}"),
        elapsed: Duration::from_secs_f64(observed_ms / 1000.0),
        bound,
    })
}

/// Result of firing one request many times concurrently.
#[derive(Debug)]
pub struct BurstReport {
    pub outcomes: Vec<ResponseOutcome>,
    pub failures: FailureReport<HarnessError>,
    pub elapsed: Duration,
    pub latency: LatencySummary,
}

impl BurstReport {
    pub fn completed(&self) -> usize {
        self.outcomes.len()
    }
}

/// Fires `count` copies of `spec` at once and summarizes what came back.
pub async fn burst(executor: &Executor, spec: &RequestSpec, count: usize) -> Result<BurstReport, HarnessError> {
    let specs = vec![spec.clone(); count];
    let started = Instant::now();
    let results = executor.execute_concurrent(&specs).await;
    let elapsed = started.elapsed();

    let mut failures = FailureReport::new(count);
    let mut outcomes = Vec::with_capacity(count);
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => failures.push(index, err),
        }
    }

    let latency = LatencySummary::from_outcomes(&outcomes)?;
    info!(
        request = %spec.describe(),
        count,
        completed = outcomes.len(),
        failed = failures.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        p95_ms = latency.p95_ms,
        "burst finished"
    );

    Ok(BurstReport {
        outcomes,
        failures,
        elapsed,
        latency,
    })
}
