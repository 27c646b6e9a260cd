//! Ingestion supervisor
//!
//! Starts one online loop per stream, or the single offline merge, on a `JoinSet` and
//! collects their outcomes into a report.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{IngestionMode, LidarSource, MappingEngine, MovementSensorSource};
use observability::MetricsSummary;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::IngestionConfig;
use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::offline::OfflineMergeEngine;
use crate::online::{run_lidar_loop, run_movement_loop, LoopOutcome};
use crate::rate::RateController;

/// Task name of the offline merge
pub const OFFLINE_TASK: &str = "offline_merge";

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub mode: IngestionMode,

    /// Outcome per task: the sensor name online, [`OFFLINE_TASK`] offline
    pub outcomes: BTreeMap<String, LoopOutcome>,

    pub metrics: MetricsSummary,
    pub elapsed: Duration,
}

impl IngestionReport {
    /// True if every task ran its data out rather than being cancelled
    pub fn is_complete(&self) -> bool {
        self.outcomes
            .values()
            .all(|outcome| *outcome == LoopOutcome::JobDone)
    }
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ingestion Report ===")?;
        writeln!(f, "Mode: {:?}", self.mode)?;
        writeln!(f, "Elapsed: {:.3}s", self.elapsed.as_secs_f64())?;
        for (task, outcome) in &self.outcomes {
            writeln!(f, "  {task}: {outcome:?}")?;
        }
        write!(f, "{}", self.metrics)
    }
}

/// Owns the running ingestion tasks
pub struct IngestionSupervisor {
    mode: IngestionMode,
    tasks: JoinSet<LoopOutcome>,
    names: HashMap<Id, String>,
    metrics: Arc<IngestionMetrics>,
    token: CancellationToken,
    started: Instant,
}

impl IngestionSupervisor {
    /// Validate the config and spawn its tasks
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<E, L, M>(
        config: IngestionConfig<E, L, M>,
        token: CancellationToken,
    ) -> Result<Self>
    where
        E: MappingEngine + Send + Sync + 'static,
        L: LidarSource + Send + 'static,
        M: MovementSensorSource + Send + 'static,
    {
        config.validate()?;
        let settings = config.settings();
        let IngestionConfig {
            engine,
            mode,
            lidar,
            movement,
            ..
        } = config;

        let metrics = Arc::new(IngestionMetrics::new());
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        match mode {
            IngestionMode::Online => {
                let name = lidar.source.name().to_string();
                let rate =
                    RateController::from_frequency(lidar.data_frequency_hz.unwrap_or_default());
                let (task_engine, task_metrics, task_token) =
                    (engine.clone(), metrics.clone(), token.clone());
                let mut source = lidar.source;
                let handle = tasks.spawn(async move {
                    run_lidar_loop(
                        &*task_engine,
                        &mut source,
                        rate,
                        &settings,
                        &task_metrics,
                        &task_token,
                    )
                    .await
                });
                names.insert(handle.id(), name);

                if let Some(movement) = movement {
                    let name = movement.source.name().to_string();
                    let rate = RateController::from_frequency(
                        movement.data_frequency_hz.unwrap_or_default(),
                    );
                    let (task_engine, task_metrics, task_token) =
                        (engine.clone(), metrics.clone(), token.clone());
                    let mut source = movement.source;
                    let handle = tasks.spawn(async move {
                        run_movement_loop(
                            &*task_engine,
                            &mut source,
                            rate,
                            &settings,
                            &task_metrics,
                            &task_token,
                        )
                        .await
                    });
                    names.insert(handle.id(), name);
                }
            }
            IngestionMode::Offline => {
                let (task_metrics, task_token) = (metrics.clone(), token.clone());
                let handle = tasks.spawn(async move {
                    let mut lidar = lidar.source;
                    let mut movement = movement.map(|stream| stream.source);
                    OfflineMergeEngine::new(&*engine, settings, &task_metrics, &task_token)
                        .run(&mut lidar, movement.as_mut())
                        .await
                });
                names.insert(handle.id(), OFFLINE_TASK.to_string());
            }
        }

        info!(?mode, tasks = tasks.len(), "ingestion started");
        observability::record_active_tasks(tasks.len());

        Ok(Self {
            mode,
            tasks,
            names,
            metrics,
            token,
            started: Instant::now(),
        })
    }

    /// Live metrics of the run
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Ask every task to stop
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for every task to finish
    ///
    /// # Errors
    /// [`IngestionError::TaskFailed`] if a task panicked; the remaining tasks are
    /// cancelled first.
    pub async fn wait(mut self) -> Result<IngestionReport> {
        let mut outcomes = BTreeMap::new();

        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    let name = self.names.remove(&id).unwrap_or_default();
                    info!(task = %name, ?outcome, "ingestion task finished");
                    outcomes.insert(name, outcome);
                }
                Err(e) => {
                    let name = self.names.remove(&e.id()).unwrap_or_default();
                    error!(task = %name, error = %e, "ingestion task failed, cancelling the run");
                    self.token.cancel();
                    self.tasks.shutdown().await;
                    observability::record_active_tasks(0);
                    return Err(IngestionError::task_failed(name, e.to_string()));
                }
            }
            observability::record_active_tasks(self.tasks.len());
        }

        let report = IngestionReport {
            mode: self.mode,
            outcomes,
            metrics: self.metrics.summary(),
            elapsed: self.started.elapsed(),
        };
        info!(
            complete = report.is_complete(),
            elapsed = ?report.elapsed,
            accepted = report.metrics.total_accepted,
            "ingestion finished"
        );
        Ok(report)
    }
}
