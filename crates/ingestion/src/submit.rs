//! Facade submission: single attempt (online) and retry-until-success (offline)

use std::time::Duration;

use contracts::{
    EngineError, MappingEngine, ReadingTime, TimedImuReading, TimedLidarReading,
    TimedMovementSensorReading, TimedOdometerReading,
};
use observability::{DropReason, SubmissionKind, SubmissionOutcome};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::metrics::IngestionMetrics;

/// Pause before resubmitting after a non-contention failure
const ERROR_RETRY_DELAY: Duration = Duration::from_millis(10);

/// One engine call worth of data
#[derive(Debug, Clone, Copy)]
pub(crate) enum Submission<'r> {
    Lidar(&'r TimedLidarReading),
    Imu(&'r TimedImuReading),
    Odometer(&'r TimedOdometerReading),
}

impl Submission<'_> {
    pub(crate) fn kind(&self) -> SubmissionKind {
        match self {
            Submission::Lidar(_) => SubmissionKind::Lidar,
            Submission::Imu(_) => SubmissionKind::Imu,
            Submission::Odometer(_) => SubmissionKind::Odometer,
        }
    }

    pub(crate) fn time(&self) -> ReadingTime {
        match self {
            Submission::Lidar(r) => r.time,
            Submission::Imu(r) => r.time,
            Submission::Odometer(r) => r.time,
        }
    }
}

/// Capability dispatch for a movement bundle
///
/// One submission per advertised capability. An advertised capability whose
/// sub-reading is missing is logged and skipped; sub-readings outside the advertised
/// set are ignored.
pub(crate) fn dispatch_movement<'r>(
    sensor: &str,
    reading: &'r TimedMovementSensorReading,
) -> Vec<Submission<'r>> {
    let capabilities = reading.capabilities;
    let mut submissions = Vec::with_capacity(2);

    if capabilities.imu_supported {
        match &reading.imu {
            Some(imu) => submissions.push(Submission::Imu(imu)),
            None => warn!(sensor, "imu advertised but missing from reading, skipping"),
        }
    } else if reading.imu.is_some() {
        debug!(sensor, "ignoring imu sub-reading outside advertised capabilities");
    }

    if capabilities.odometer_supported {
        match &reading.odometer {
            Some(odometer) => submissions.push(Submission::Odometer(odometer)),
            None => warn!(sensor, "odometer advertised but missing from reading, skipping"),
        }
    } else if reading.odometer.is_some() {
        debug!(sensor, "ignoring odometer sub-reading outside advertised capabilities");
    }

    submissions
}

/// How a retry-until-success submission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Submitted,
    Cancelled,
}

/// Submits readings of one stream to the engine
pub(crate) struct Submitter<'a, E> {
    engine: &'a E,
    sensor: &'a str,
    timeout: Duration,
    metrics: &'a IngestionMetrics,
}

impl<'a, E: MappingEngine> Submitter<'a, E> {
    pub(crate) fn new(
        engine: &'a E,
        sensor: &'a str,
        timeout: Duration,
        metrics: &'a IngestionMetrics,
    ) -> Self {
        Self {
            engine,
            sensor,
            timeout,
            metrics,
        }
    }

    /// One facade call
    async fn attempt(&self, submission: Submission<'_>) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = match submission {
            Submission::Lidar(reading) => {
                self.engine
                    .add_lidar_reading(self.timeout, self.sensor, reading)
                    .await
            }
            Submission::Imu(reading) => {
                self.engine
                    .add_imu_reading(self.timeout, self.sensor, reading)
                    .await
            }
            Submission::Odometer(reading) => {
                self.engine
                    .add_odometer_reading(self.timeout, self.sensor, reading)
                    .await
            }
        };

        let outcome = match &result {
            Ok(()) => SubmissionOutcome::Accepted,
            Err(e) if e.is_lock_busy() => SubmissionOutcome::LockBusy,
            Err(_) => SubmissionOutcome::Failed,
        };
        self.metrics.record_submission(
            self.sensor,
            submission.kind(),
            outcome,
            started.elapsed(),
        );
        result
    }

    /// Submit exactly once; on failure the reading is dropped
    ///
    /// Returns true if the engine accepted the reading.
    pub(crate) async fn submit_once(&self, submission: Submission<'_>) -> bool {
        match self.attempt(submission).await {
            Ok(()) => {
                trace!(
                    sensor = self.sensor,
                    kind = submission.kind().as_str(),
                    reading_time = %submission.time(),
                    "submitted"
                );
                true
            }
            Err(e) if e.is_lock_busy() => {
                debug!(
                    sensor = self.sensor,
                    kind = submission.kind().as_str(),
                    reading_time = %submission.time(),
                    "engine busy, dropping reading"
                );
                self.metrics.record_drop(self.sensor, DropReason::LockBusy);
                false
            }
            Err(e) => {
                warn!(
                    sensor = self.sensor,
                    kind = submission.kind().as_str(),
                    reading_time = %submission.time(),
                    error = %e,
                    "submission failed, dropping reading"
                );
                self.metrics.record_drop(self.sensor, DropReason::EngineError);
                false
            }
        }
    }

    /// Resubmit until the engine accepts the reading
    ///
    /// Lock-busy is retried immediately; any other error after a short pause. Only
    /// cancellation ends the loop without success.
    pub(crate) async fn submit_until_success(
        &self,
        submission: Submission<'_>,
        token: &CancellationToken,
    ) -> Delivery {
        let kind = submission.kind();
        loop {
            if token.is_cancelled() {
                return Delivery::Cancelled;
            }

            match self.attempt(submission).await {
                Ok(()) => {
                    trace!(
                        sensor = self.sensor,
                        kind = kind.as_str(),
                        reading_time = %submission.time(),
                        "submitted"
                    );
                    return Delivery::Submitted;
                }
                Err(e) if e.is_lock_busy() => {
                    debug!(sensor = self.sensor, kind = kind.as_str(), "engine busy, retrying");
                    self.metrics.record_retry(self.sensor, kind);
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    warn!(
                        sensor = self.sensor,
                        kind = kind.as_str(),
                        reading_time = %submission.time(),
                        error = %e,
                        "submission failed, retrying"
                    );
                    self.metrics.record_retry(self.sensor, kind);
                    tokio::select! {
                        _ = token.cancelled() => return Delivery::Cancelled,
                        _ = tokio::time::sleep(ERROR_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    /// Submit every dispatched sub-reading of a movement bundle until each succeeds
    ///
    /// Sub-submissions run in order; one that already succeeded is not repeated.
    pub(crate) async fn submit_movement_until_success(
        &self,
        reading: &TimedMovementSensorReading,
        token: &CancellationToken,
    ) -> Delivery {
        for submission in dispatch_movement(self.sensor, reading) {
            if self.submit_until_success(submission, token).await == Delivery::Cancelled {
                return Delivery::Cancelled;
            }
        }
        Delivery::Submitted
    }
}
