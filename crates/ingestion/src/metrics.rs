//! Ingestion metrics
//!
//! Every event goes to the Prometheus series and to an in-memory aggregator that
//! backs the end-of-run report.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use observability::{
    DropReason, IngestionMetricsAggregator, MetricsSummary, SubmissionKind, SubmissionOutcome,
};

/// Shared ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    aggregator: Mutex<IngestionMetricsAggregator>,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn aggregator(&self) -> MutexGuard<'_, IngestionMetricsAggregator> {
        // Counters stay usable after a panicking holder
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_submission(
        &self,
        stream: &str,
        kind: SubmissionKind,
        outcome: SubmissionOutcome,
        latency: Duration,
    ) {
        observability::record_submission(stream, kind, outcome, latency);
        self.aggregator().submission(stream, kind, outcome, latency);
    }

    pub fn record_drop(&self, stream: &str, reason: DropReason) {
        observability::record_drop(stream, reason);
        self.aggregator().drop_reading(stream);
    }

    pub fn record_retry(&self, stream: &str, kind: SubmissionKind) {
        observability::record_retry(stream, kind);
        self.aggregator().retry(stream);
    }

    pub fn record_poll_fault(&self, stream: &str) {
        observability::record_poll_fault(stream);
        self.aggregator().poll_fault(stream);
    }

    pub fn record_discarded(&self, stream: &str, count: u64) {
        observability::record_discarded(stream, count);
        self.aggregator().discarded(stream, count);
    }

    pub fn record_rate_sleep(&self, stream: &str, sleep: Duration) {
        observability::record_rate_sleep(stream, sleep);
        self.aggregator().rate_sleep(sleep);
    }

    pub fn record_final_optimization(&self, success: bool) {
        observability::record_final_optimization(success);
        self.aggregator().final_optimization(success);
    }

    /// Summary of everything recorded so far
    pub fn summary(&self) -> MetricsSummary {
        self.aggregator().summary()
    }
}
