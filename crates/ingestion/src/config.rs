//! Runtime ingestion configuration

use std::sync::Arc;
use std::time::Duration;

use contracts::{IngestionBlueprint, IngestionMode, MIN_DATA_FREQUENCY_HZ};

use crate::error::{IngestionError, Result};

/// One sensor stream: its source and, online, its nominal data rate
#[derive(Debug)]
pub struct StreamConfig<S> {
    pub source: S,

    /// Nominal data rate (Hz), required online
    pub data_frequency_hz: Option<f64>,
}

impl<S> StreamConfig<S> {
    pub fn new(source: S, data_frequency_hz: Option<f64>) -> Self {
        Self {
            source,
            data_frequency_hz,
        }
    }
}

/// Timeouts shared by every loop of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSettings {
    /// Per-call facade timeout
    pub submission_timeout: Duration,

    /// Timeout of the final optimization call (offline)
    pub final_optimization_timeout: Duration,
}

/// Everything one ingestion run needs
///
/// - `E`: mapping engine facade
/// - `L`: lidar source
/// - `M`: movement sensor source
#[derive(Debug)]
pub struct IngestionConfig<E, L, M> {
    pub engine: Arc<E>,
    pub mode: IngestionMode,
    pub lidar: StreamConfig<L>,
    pub movement: Option<StreamConfig<M>>,

    /// Per-call facade timeout
    pub submission_timeout: Duration,

    /// Timeout of the final optimization call (offline)
    pub final_optimization_timeout: Duration,
}

impl<E, L, M> IngestionConfig<E, L, M> {
    const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(5);
    const DEFAULT_FINAL_OPTIMIZATION_TIMEOUT: Duration = Duration::from_secs(60);

    /// Offline run over a lidar stream
    pub fn offline(engine: Arc<E>, lidar: L) -> Self {
        Self {
            engine,
            mode: IngestionMode::Offline,
            lidar: StreamConfig::new(lidar, None),
            movement: None,
            submission_timeout: Self::DEFAULT_SUBMISSION_TIMEOUT,
            final_optimization_timeout: Self::DEFAULT_FINAL_OPTIMIZATION_TIMEOUT,
        }
    }

    /// Online run over a lidar stream polled at `data_frequency_hz`
    pub fn online(engine: Arc<E>, lidar: L, data_frequency_hz: f64) -> Self {
        Self {
            engine,
            mode: IngestionMode::Online,
            lidar: StreamConfig::new(lidar, Some(data_frequency_hz)),
            movement: None,
            submission_timeout: Self::DEFAULT_SUBMISSION_TIMEOUT,
            final_optimization_timeout: Self::DEFAULT_FINAL_OPTIMIZATION_TIMEOUT,
        }
    }

    /// Add a movement sensor stream
    pub fn with_movement(mut self, source: M, data_frequency_hz: Option<f64>) -> Self {
        self.movement = Some(StreamConfig::new(source, data_frequency_hz));
        self
    }

    pub fn with_submission_timeout(mut self, timeout: Duration) -> Self {
        self.submission_timeout = timeout;
        self
    }

    pub fn with_final_optimization_timeout(mut self, timeout: Duration) -> Self {
        self.final_optimization_timeout = timeout;
        self
    }

    /// Combine a validated blueprint with the built engine and sources
    ///
    /// # Errors
    /// [`IngestionError::InvalidConfig`] if the movement source does not match the
    /// blueprint or the result fails [`IngestionConfig::validate`].
    pub fn from_blueprint(
        blueprint: &IngestionBlueprint,
        engine: Arc<E>,
        lidar: L,
        movement: Option<M>,
    ) -> Result<Self> {
        let movement = match (&blueprint.movement_sensor, movement) {
            (Some(config), Some(source)) => {
                Some(StreamConfig::new(source, config.data_frequency_hz))
            }
            (None, None) => None,
            (Some(config), None) => {
                return Err(IngestionError::invalid_config(
                    "movement_sensor",
                    format!("no source built for movement sensor '{}'", config.name),
                ))
            }
            (None, Some(_)) => {
                return Err(IngestionError::invalid_config(
                    "movement_sensor",
                    "movement source given but none configured",
                ))
            }
        };

        let config = Self {
            engine,
            mode: blueprint.session.mode,
            lidar: StreamConfig::new(lidar, blueprint.lidar.data_frequency_hz),
            movement,
            submission_timeout: blueprint.session.submission_timeout(),
            final_optimization_timeout: blueprint.engine.final_optimization_timeout(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> IngestionSettings {
        IngestionSettings {
            submission_timeout: self.submission_timeout,
            final_optimization_timeout: self.final_optimization_timeout,
        }
    }

    /// Check the invariants the loops rely on
    pub fn validate(&self) -> Result<()> {
        if self.submission_timeout.is_zero() {
            return Err(IngestionError::invalid_config(
                "submission_timeout",
                "must be positive",
            ));
        }
        if self.mode == IngestionMode::Online {
            check_rate("lidar.data_frequency_hz", self.lidar.data_frequency_hz)?;
            if let Some(movement) = &self.movement {
                check_rate(
                    "movement_sensor.data_frequency_hz",
                    movement.data_frequency_hz,
                )?;
            }
        }
        Ok(())
    }
}

fn check_rate(field: &str, rate: Option<f64>) -> Result<()> {
    match rate {
        Some(hz) if hz.is_finite() && hz >= MIN_DATA_FREQUENCY_HZ => Ok(()),
        Some(hz) => Err(IngestionError::invalid_config(
            field,
            format!("data rate must be at least {MIN_DATA_FREQUENCY_HZ} Hz, got {hz}"),
        )),
        None => Err(IngestionError::invalid_config(
            field,
            "online streams need a data rate",
        )),
    }
}
