use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

/// Failure reason to number of iterations that failed with it.
pub type FailureCounts = BTreeMap<String, u64>;

/// Measurements of one worker's timed phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerResult {
    pub failures: FailureCounts,
    pub iter_duration_seconds: f64,
}

impl WorkerResult {
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        *self.failures.entry(reason.into()).or_default() += 1;
    }

    #[must_use]
    pub fn failures_total(&self) -> u64 {
        self.failures.values().sum()
    }

    /// Sets the average from the wall-clock time of `iterations` runs,
    /// truncated to whole nanoseconds.
    pub fn finish(&mut self, elapsed: Duration, iterations: usize) {
        let iter_nanos = elapsed.as_nanos() / iterations.max(1) as u128;
        self.iter_duration_seconds = iter_nanos as f64 / 1_000_000_000.0;
    }
}

/// Aggregate over every worker of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalResult {
    pub failures: FailureCounts,
    pub iter_duration_seconds: f64,
    pub failures_total: u64,
    pub iterations_total: u64,
    #[serde(skip)]
    jobs: usize,
}

impl GlobalResult {
    #[must_use]
    pub fn new(jobs: usize, iterations: usize) -> Self {
        Self {
            failures: FailureCounts::new(),
            iter_duration_seconds: 0.0,
            failures_total: 0,
            iterations_total: jobs as u64 * iterations as u64,
            jobs,
        }
    }

    pub fn merge(&mut self, result: WorkerResult) {
        for (reason, count) in result.failures {
            *self.failures.entry(reason).or_default() += count;
            self.failures_total += count;
        }
        self.iter_duration_seconds += result.iter_duration_seconds / self.jobs as f64;
    }

    /// Share of failed iterations, rounded down to a whole percent.
    #[must_use]
    pub fn failure_percent(&self) -> u64 {
        if self.iterations_total == 0 {
            return 0;
        }
        100 * self.failures_total / self.iterations_total
    }

    pub fn report(&self) {
        info!(
            "Average scenario execution time: {:.6}s",
            self.iter_duration_seconds
        );
        info!(
            "Failed {}/{} ({:02}%)",
            self.failures_total,
            self.iterations_total,
            self.failure_percent()
        );
        for (reason, count) in &self.failures {
            info!("Failure {reason:?}: {count} times");
        }
    }
}
