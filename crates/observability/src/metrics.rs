//! Ingestion metrics
//!
//! Prometheus series via the `metrics` facade plus an in-memory aggregator for the
//! end-of-run summary.

use std::collections::BTreeMap;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// What kind of engine call a submission was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubmissionKind {
    Lidar,
    Imu,
    Odometer,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Lidar => "lidar",
            SubmissionKind::Imu => "imu",
            SubmissionKind::Odometer => "odometer",
        }
    }
}

/// Result of one facade call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted,
    LockBusy,
    Failed,
}

impl SubmissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted => "accepted",
            SubmissionOutcome::LockBusy => "lock_busy",
            SubmissionOutcome::Failed => "failed",
        }
    }
}

/// Why an online reading was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    LockBusy,
    EngineError,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::LockBusy => "lock_busy",
            DropReason::EngineError => "engine_error",
        }
    }
}

/// Record one facade call
pub fn record_submission(
    stream: &str,
    kind: SubmissionKind,
    outcome: SubmissionOutcome,
    latency: Duration,
) {
    counter!(
        "slam_ingest_submissions_total",
        "stream" => stream.to_string(),
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    histogram!("slam_ingest_submission_latency_ms", "kind" => kind.as_str())
        .record(latency.as_secs_f64() * 1000.0);
}

/// Record an online reading that was dropped after its single attempt
pub fn record_drop(stream: &str, reason: DropReason) {
    counter!(
        "slam_ingest_readings_dropped_total",
        "stream" => stream.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record an offline resubmission
pub fn record_retry(stream: &str, kind: SubmissionKind) {
    counter!(
        "slam_ingest_retries_total",
        "stream" => stream.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a failed poll that was not end-of-dataset
pub fn record_poll_fault(stream: &str) {
    counter!("slam_ingest_poll_faults_total", "stream" => stream.to_string()).increment(1);
}

/// Record movement readings discarded before the first lidar reading
pub fn record_discarded(stream: &str, count: u64) {
    if count > 0 {
        counter!("slam_ingest_discarded_total", "stream" => stream.to_string()).increment(count);
    }
}

/// Record a rate-controlled sleep
pub fn record_rate_sleep(stream: &str, sleep: Duration) {
    histogram!("slam_ingest_rate_sleep_ms", "stream" => stream.to_string())
        .record(sleep.as_secs_f64() * 1000.0);
}

/// Record the final optimization result
pub fn record_final_optimization(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("slam_ingest_final_optimization_total", "status" => status).increment(1);
}

/// Record the number of running ingestion tasks
pub fn record_active_tasks(count: usize) {
    gauge!("slam_ingest_active_tasks").set(count as f64);
}

/// Per-stream counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamCounters {
    pub accepted: u64,
    pub lock_busy: u64,
    pub failed: u64,
    pub dropped: u64,
    pub retries: u64,
    pub poll_faults: u64,
    pub discarded: u64,
}

/// Ingestion metrics aggregator
///
/// Aggregates in memory for statistics and the summary printed at shutdown.
#[derive(Debug, Clone, Default)]
pub struct IngestionMetricsAggregator {
    /// Counters by stream name
    pub streams: BTreeMap<String, StreamCounters>,

    /// Accepted submissions by kind
    pub accepted_by_kind: BTreeMap<SubmissionKind, u64>,

    /// Facade call latency (ms), all outcomes
    pub latency_stats: RunningStats,

    /// Rate-controlled sleep (ms)
    pub sleep_stats: RunningStats,

    /// Final optimization result, if it ran
    pub final_optimization: Option<bool>,
}

impl IngestionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self, stream: &str) -> &mut StreamCounters {
        self.streams.entry(stream.to_string()).or_default()
    }

    pub fn submission(
        &mut self,
        stream: &str,
        kind: SubmissionKind,
        outcome: SubmissionOutcome,
        latency: Duration,
    ) {
        let counters = self.stream(stream);
        match outcome {
            SubmissionOutcome::Accepted => counters.accepted += 1,
            SubmissionOutcome::LockBusy => counters.lock_busy += 1,
            SubmissionOutcome::Failed => counters.failed += 1,
        }
        if outcome == SubmissionOutcome::Accepted {
            *self.accepted_by_kind.entry(kind).or_insert(0) += 1;
        }
        self.latency_stats.push(latency.as_secs_f64() * 1000.0);
    }

    pub fn drop_reading(&mut self, stream: &str) {
        self.stream(stream).dropped += 1;
    }

    pub fn retry(&mut self, stream: &str) {
        self.stream(stream).retries += 1;
    }

    pub fn poll_fault(&mut self, stream: &str) {
        self.stream(stream).poll_faults += 1;
    }

    pub fn discarded(&mut self, stream: &str, count: u64) {
        self.stream(stream).discarded += count;
    }

    pub fn rate_sleep(&mut self, sleep: Duration) {
        self.sleep_stats.push(sleep.as_secs_f64() * 1000.0);
    }

    pub fn final_optimization(&mut self, success: bool) {
        self.final_optimization = Some(success);
    }

    /// Build the summary report
    pub fn summary(&self) -> MetricsSummary {
        let total = |f: fn(&StreamCounters) -> u64| self.streams.values().map(f).sum::<u64>();
        let accepted = total(|c| c.accepted);
        let attempts = accepted + total(|c| c.lock_busy) + total(|c| c.failed);

        MetricsSummary {
            total_accepted: accepted,
            total_lock_busy: total(|c| c.lock_busy),
            total_failed: total(|c| c.failed),
            total_dropped: total(|c| c.dropped),
            total_retries: total(|c| c.retries),
            total_poll_faults: total(|c| c.poll_faults),
            total_discarded: total(|c| c.discarded),
            contention_rate: if attempts > 0 {
                total(|c| c.lock_busy) as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            accepted_by_kind: self
                .accepted_by_kind
                .iter()
                .map(|(kind, count)| (kind.as_str().to_string(), *count))
                .collect(),
            latency_ms: StatsSummary::from(&self.latency_stats),
            rate_sleep_ms: StatsSummary::from(&self.sleep_stats),
            streams: self.streams.clone(),
            final_optimization: self.final_optimization,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_accepted: u64,
    pub total_lock_busy: u64,
    pub total_failed: u64,
    pub total_dropped: u64,
    pub total_retries: u64,
    pub total_poll_faults: u64,
    pub total_discarded: u64,
    /// Share of facade calls answered with lock-busy (%)
    pub contention_rate: f64,
    pub accepted_by_kind: BTreeMap<String, u64>,
    pub latency_ms: StatsSummary,
    pub rate_sleep_ms: StatsSummary,
    pub streams: BTreeMap<String, StreamCounters>,
    pub final_optimization: Option<bool>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingestion Metrics Summary ===")?;
        writeln!(f, "Accepted submissions: {}", self.total_accepted)?;
        writeln!(
            f,
            "Lock busy: {} ({:.2}%)",
            self.total_lock_busy, self.contention_rate
        )?;
        writeln!(f, "Failed submissions: {}", self.total_failed)?;
        writeln!(f, "Dropped readings: {}", self.total_dropped)?;
        writeln!(f, "Retries: {}", self.total_retries)?;
        writeln!(f, "Poll faults: {}", self.total_poll_faults)?;
        writeln!(f, "Discarded before first scan: {}", self.total_discarded)?;
        writeln!(f, "Submission latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Rate sleep (ms): {}", self.rate_sleep_ms)?;

        if !self.accepted_by_kind.is_empty() {
            writeln!(f, "Accepted by kind:")?;
            for (kind, count) in &self.accepted_by_kind {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        match self.final_optimization {
            Some(true) => writeln!(f, "Final optimization: ok")?,
            Some(false) => writeln!(f, "Final optimization: failed")?,
            None => {}
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
