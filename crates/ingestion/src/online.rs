//! Online ingestion loops
//!
//! One loop per stream. Each iteration polls once, submits once and sleeps whatever is
//! left of the nominal interval. Readings that cannot be delivered on the first try
//! are dropped; a live stream must not fall behind its sensor.
//!
//! The lidar and movement loops share nothing but the engine; they only meet through
//! its lock contention.

use contracts::{LidarSource, MappingEngine, MovementSensorSource, SourceError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::IngestionSettings;
use crate::metrics::IngestionMetrics;
use crate::rate::RateController;
use crate::submit::{dispatch_movement, Submission, Submitter};

/// Terminal state of a loop or of the offline merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The source ran out of data (offline: after the final optimization)
    JobDone,
    /// The shared cancellation token fired
    Cancelled,
}

enum Step<T> {
    Reading(T),
    Skip,
    Stop(LoopOutcome),
}

/// Poll once, racing cancellation
async fn poll<T, F>(
    sensor: &str,
    token: &CancellationToken,
    metrics: &IngestionMetrics,
    next: F,
) -> Step<T>
where
    F: std::future::Future<Output = Result<T, SourceError>>,
{
    let polled = tokio::select! {
        biased;
        _ = token.cancelled() => return Step::Stop(LoopOutcome::Cancelled),
        polled = next => polled,
    };

    match polled {
        Ok(reading) => Step::Reading(reading),
        Err(e) if e.is_end_of_dataset() => {
            info!(sensor, "source exhausted, job done");
            Step::Stop(LoopOutcome::JobDone)
        }
        Err(e) => {
            warn!(sensor, error = %e, "poll failed, skipping iteration");
            metrics.record_poll_fault(sensor);
            Step::Skip
        }
    }
}

/// Sleep the rest of the interval; false if cancelled meanwhile
async fn pace(
    sensor: &str,
    rate: &RateController,
    elapsed: std::time::Duration,
    token: &CancellationToken,
    metrics: &IngestionMetrics,
) -> bool {
    let sleep = rate.remaining(elapsed);
    metrics.record_rate_sleep(sensor, sleep);
    if sleep.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(sleep) => true,
    }
}

/// Online lidar loop
#[instrument(name = "online_lidar_loop", skip_all, fields(sensor = source.name()))]
pub async fn run_lidar_loop<E, L>(
    engine: &E,
    source: &mut L,
    rate: RateController,
    settings: &IngestionSettings,
    metrics: &IngestionMetrics,
    token: &CancellationToken,
) -> LoopOutcome
where
    E: MappingEngine,
    L: LidarSource,
{
    let sensor = source.name().to_string();
    let submitter = Submitter::new(engine, &sensor, settings.submission_timeout, metrics);
    debug!(interval = ?rate.interval(), "online lidar loop started");

    while !token.is_cancelled() {
        let started = Instant::now();
        let reading = match poll(&sensor, token, metrics, source.next_reading()).await {
            Step::Reading(reading) => reading,
            Step::Stop(outcome) => return outcome,
            Step::Skip => {
                if !pace(&sensor, &rate, started.elapsed(), token, metrics).await {
                    break;
                }
                continue;
            }
        };

        if token.is_cancelled() {
            break;
        }
        let submit_started = Instant::now();
        submitter.submit_once(Submission::Lidar(&reading)).await;

        if !pace(&sensor, &rate, submit_started.elapsed(), token, metrics).await {
            break;
        }
    }

    info!(sensor = %sensor, "online lidar loop cancelled");
    LoopOutcome::Cancelled
}

/// Online movement sensor loop
///
/// Each present, advertised sub-reading is submitted once; the two sub-submissions
/// of a bundle succeed or drop independently.
#[instrument(name = "online_movement_loop", skip_all, fields(sensor = source.name()))]
pub async fn run_movement_loop<E, M>(
    engine: &E,
    source: &mut M,
    rate: RateController,
    settings: &IngestionSettings,
    metrics: &IngestionMetrics,
    token: &CancellationToken,
) -> LoopOutcome
where
    E: MappingEngine,
    M: MovementSensorSource,
{
    let sensor = source.name().to_string();
    let submitter = Submitter::new(engine, &sensor, settings.submission_timeout, metrics);
    debug!(
        interval = ?rate.interval(),
        capabilities = ?source.capabilities(),
        "online movement loop started"
    );

    'outer: while !token.is_cancelled() {
        let started = Instant::now();
        let reading = match poll(&sensor, token, metrics, source.next_reading()).await {
            Step::Reading(reading) => reading,
            Step::Stop(outcome) => return outcome,
            Step::Skip => {
                if !pace(&sensor, &rate, started.elapsed(), token, metrics).await {
                    break;
                }
                continue;
            }
        };

        let submit_started = Instant::now();
        for submission in dispatch_movement(&sensor, &reading) {
            if token.is_cancelled() {
                break 'outer;
            }
            submitter.submit_once(submission).await;
        }

        if !pace(&sensor, &rate, submit_started.elapsed(), token, metrics).await {
            break;
        }
    }

    info!(sensor = %sensor, "online movement loop cancelled");
    LoopOutcome::Cancelled
}
