//! Offline merge engine
//!
//! A single sequential loop owning the current lidar reading and the current movement
//! reading. Whichever is earlier goes to the engine first (lidar wins ties), every
//! submission is retried until it succeeds, and the first stream to run dry ends the run
//! with a final optimization.

use std::time::Duration;

use contracts::{
    LidarSource, MappingEngine, MovementSensorSource, ReadingTime, SourceError, TimedLidarReading,
    TimedMovementSensorReading,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::IngestionSettings;
use crate::metrics::IngestionMetrics;
use crate::online::LoopOutcome;
use crate::submit::{Delivery, Submission, Submitter};

/// Pause before repolling a source that faulted
const POLL_RETRY_DELAY: Duration = Duration::from_millis(10);

enum Fetch<T> {
    Reading(T),
    Exhausted,
    Cancelled,
}

/// The movement stream with its current reading
struct MovementStream<'s, M> {
    source: &'s mut M,
    name: String,
    current: TimedMovementSensorReading,
    time: ReadingTime,
}

/// Zero-loss, time-ordered ingestion of a recorded dataset
pub struct OfflineMergeEngine<'a, E> {
    engine: &'a E,
    settings: IngestionSettings,
    metrics: &'a IngestionMetrics,
    token: &'a CancellationToken,
}

impl<'a, E: MappingEngine> OfflineMergeEngine<'a, E> {
    pub fn new(
        engine: &'a E,
        settings: IngestionSettings,
        metrics: &'a IngestionMetrics,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            engine,
            settings,
            metrics,
            token,
        }
    }

    fn submitter<'n>(&self, sensor: &'n str) -> Submitter<'n, E>
    where
        'a: 'n,
    {
        Submitter::new(
            self.engine,
            sensor,
            self.settings.submission_timeout,
            self.metrics,
        )
    }

    /// Merge the lidar stream with the optional movement stream until one runs out
    #[instrument(name = "offline_merge", skip_all, fields(lidar = lidar.name()))]
    pub async fn run<L, M>(&self, lidar: &mut L, movement: Option<&mut M>) -> LoopOutcome
    where
        L: LidarSource,
        M: MovementSensorSource,
    {
        let lidar_name = lidar.name().to_string();

        let mut current_lidar = match self.fetch_lidar(lidar).await {
            Fetch::Reading(reading) => reading,
            Fetch::Exhausted => {
                info!(sensor = %lidar_name, "lidar source empty, nothing to ingest");
                return LoopOutcome::JobDone;
            }
            Fetch::Cancelled => return LoopOutcome::Cancelled,
        };
        debug!(first_lidar_time = %current_lidar.time, "anchored on first lidar reading");

        let mut movement = match movement {
            None => None,
            Some(source) => match self.skip_until(source, current_lidar.time).await {
                Fetch::Reading(stream) => Some(stream),
                Fetch::Exhausted => return self.finish().await,
                Fetch::Cancelled => return LoopOutcome::Cancelled,
            },
        };

        while !self.token.is_cancelled() {
            match movement.as_mut() {
                Some(stream) if stream.time < current_lidar.time => {
                    let delivery = self
                        .submitter(&stream.name)
                        .submit_movement_until_success(&stream.current, self.token)
                        .await;
                    if delivery == Delivery::Cancelled {
                        break;
                    }

                    match self.fetch_movement(stream.source).await {
                        Fetch::Reading((reading, time)) => {
                            stream.current = reading;
                            stream.time = time;
                        }
                        Fetch::Exhausted => return self.finish().await,
                        Fetch::Cancelled => break,
                    }
                }
                _ => {
                    let delivery = self
                        .submitter(&lidar_name)
                        .submit_until_success(Submission::Lidar(&current_lidar), self.token)
                        .await;
                    if delivery == Delivery::Cancelled {
                        break;
                    }

                    current_lidar = match self.fetch_lidar(lidar).await {
                        Fetch::Reading(reading) => reading,
                        Fetch::Exhausted => return self.finish().await,
                        Fetch::Cancelled => break,
                    };
                }
            }
        }

        info!("offline merge cancelled, skipping final optimization");
        LoopOutcome::Cancelled
    }

    /// Discard movement readings older than the first lidar reading
    async fn skip_until<'s, M: MovementSensorSource>(
        &self,
        source: &'s mut M,
        anchor: ReadingTime,
    ) -> Fetch<MovementStream<'s, M>> {
        let name = source.name().to_string();
        let mut discarded = 0u64;

        let fetched = loop {
            match self.fetch_movement(source).await {
                Fetch::Reading((_, time)) if time < anchor => discarded += 1,
                other => break other,
            }
        };

        if discarded > 0 {
            info!(
                sensor = %name,
                discarded,
                anchor = %anchor,
                "discarded movement readings older than first lidar reading"
            );
            self.metrics.record_discarded(&name, discarded);
        }

        match fetched {
            Fetch::Reading((current, time)) => Fetch::Reading(MovementStream {
                source,
                name,
                current,
                time,
            }),
            Fetch::Exhausted => {
                info!(sensor = %name, "movement source exhausted before catching up with lidar");
                Fetch::Exhausted
            }
            Fetch::Cancelled => Fetch::Cancelled,
        }
    }

    async fn fetch_lidar<L: LidarSource>(&self, source: &mut L) -> Fetch<TimedLidarReading> {
        loop {
            let polled = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Fetch::Cancelled,
                polled = source.next_reading() => polled,
            };
            if let Some(fetch) = self.settle(source.name(), polled).await {
                return fetch;
            }
        }
    }

    /// Next movement reading with its merge time
    ///
    /// A bundle with no sub-reading has no time to merge by and is skipped.
    async fn fetch_movement<M: MovementSensorSource>(
        &self,
        source: &mut M,
    ) -> Fetch<(TimedMovementSensorReading, ReadingTime)> {
        loop {
            let polled = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Fetch::Cancelled,
                polled = source.next_reading() => polled,
            };
            match self.settle(source.name(), polled).await {
                Some(Fetch::Reading(reading)) => match reading.reading_time() {
                    Some(time) => return Fetch::Reading((reading, time)),
                    None => {
                        warn!(
                            sensor = source.name(),
                            "movement reading without sub-readings, skipping"
                        );
                        self.metrics.record_discarded(source.name(), 1);
                    }
                },
                Some(Fetch::Exhausted) => return Fetch::Exhausted,
                Some(Fetch::Cancelled) => return Fetch::Cancelled,
                None => {}
            }
        }
    }

    /// Classify a poll result; `None` means poll again
    ///
    /// Faults are repolled after a short pause so no recorded reading is skipped.
    async fn settle<T>(&self, sensor: &str, polled: Result<T, SourceError>) -> Option<Fetch<T>> {
        match polled {
            Ok(reading) => Some(Fetch::Reading(reading)),
            Err(e) if e.is_end_of_dataset() => {
                debug!(sensor, "source exhausted");
                Some(Fetch::Exhausted)
            }
            Err(e) => {
                warn!(sensor, error = %e, "poll failed, polling again");
                self.metrics.record_poll_fault(sensor);
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Some(Fetch::Cancelled),
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => None,
                }
            }
        }
    }

    /// Final optimization, then job done
    async fn finish(&self) -> LoopOutcome {
        let timeout = self.settings.final_optimization_timeout;
        info!(?timeout, "dataset complete, running final optimization");

        let started = Instant::now();
        match self.engine.run_final_optimization(timeout).await {
            Ok(()) => {
                info!(elapsed = ?started.elapsed(), "final optimization finished");
                self.metrics.record_final_optimization(true);
            }
            Err(e) => {
                error!(error = %e, "final optimization failed");
                self.metrics.record_final_optimization(false);
            }
        }
        LoopOutcome::JobDone
    }
}
