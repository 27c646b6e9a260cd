//! SourceFactory - build the configured sensor sources from an [`IngestionBlueprint`]

use contracts::{
    IngestionBlueprint, LidarConfig, LidarSource, MovementCapabilities, MovementSensorConfig,
    MovementSensorSource, SourceError, SourceKind, TimedLidarReading, TimedMovementSensorReading,
};
use tracing::{info, instrument};

use crate::error::{Result, SourceLoadError};
use crate::mock::{MockConfig, MockLidarSource, MockMovementSource};
use crate::replay::{ReplayDataset, ReplayLidarSource, ReplayMovementSource};

/// Any lidar source the factory can build
#[derive(Debug)]
pub enum AnyLidarSource {
    Mock(MockLidarSource),
    Replay(ReplayLidarSource),
}

impl LidarSource for AnyLidarSource {
    fn name(&self) -> &str {
        match self {
            Self::Mock(source) => source.name(),
            Self::Replay(source) => source.name(),
        }
    }

    async fn next_reading(&mut self) -> std::result::Result<TimedLidarReading, SourceError> {
        match self {
            Self::Mock(source) => source.next_reading().await,
            Self::Replay(source) => source.next_reading().await,
        }
    }
}

/// Any movement sensor source the factory can build
#[derive(Debug)]
pub enum AnyMovementSource {
    Mock(MockMovementSource),
    Replay(ReplayMovementSource),
}

impl MovementSensorSource for AnyMovementSource {
    fn name(&self) -> &str {
        match self {
            Self::Mock(source) => source.name(),
            Self::Replay(source) => source.name(),
        }
    }

    fn capabilities(&self) -> MovementCapabilities {
        match self {
            Self::Mock(source) => source.capabilities(),
            Self::Replay(source) => source.capabilities(),
        }
    }

    async fn next_reading(
        &mut self,
    ) -> std::result::Result<TimedMovementSensorReading, SourceError> {
        match self {
            Self::Mock(source) => source.next_reading().await,
            Self::Replay(source) => source.next_reading().await,
        }
    }
}

/// Sources for one ingestion run
#[derive(Debug)]
pub struct SensorSources {
    pub lidar: AnyLidarSource,
    pub movement: Option<AnyMovementSource>,
}

/// Builds sensor sources from a validated blueprint
pub struct SourceFactory;

impl SourceFactory {
    /// Build every configured source
    ///
    /// The replay dataset is loaded once and shared by both streams.
    #[instrument(name = "source_factory_build", skip_all, fields(lidar = %blueprint.lidar.name))]
    pub fn build(blueprint: &IngestionBlueprint) -> Result<SensorSources> {
        let dataset = if blueprint.uses_replay() {
            let replay = blueprint.replay.as_ref().ok_or_else(|| {
                let sensor = if blueprint.lidar.source == SourceKind::Replay {
                    blueprint.lidar.name.clone()
                } else {
                    blueprint
                        .movement_sensor
                        .as_ref()
                        .map(|m| m.name.clone())
                        .unwrap_or_default()
                };
                SourceLoadError::MissingReplayPath { sensor }
            })?;
            Some(ReplayDataset::load(&replay.path)?)
        } else {
            None
        };

        let lidar = Self::build_lidar(&blueprint.lidar, dataset.as_ref())?;
        let movement = blueprint
            .movement_sensor
            .as_ref()
            .map(|config| Self::build_movement(config, dataset.as_ref()))
            .transpose()?;

        info!(
            lidar = lidar.name(),
            movement = movement.as_ref().map(|m| m.name()),
            "sensor sources ready"
        );
        Ok(SensorSources { lidar, movement })
    }

    fn build_lidar(
        config: &LidarConfig,
        dataset: Option<&ReplayDataset>,
    ) -> Result<AnyLidarSource> {
        match config.source {
            SourceKind::Mock => {
                let frequency = config
                    .data_frequency_hz
                    .ok_or_else(|| SourceLoadError::MissingFrequency {
                        sensor: config.name.clone(),
                    })?;
                let mock =
                    MockConfig::from_attributes(&config.name, frequency, &config.attributes)?;
                Ok(AnyLidarSource::Mock(MockLidarSource::new(
                    &config.name,
                    mock,
                )))
            }
            SourceKind::Replay => {
                let dataset = dataset.ok_or_else(|| SourceLoadError::MissingReplayPath {
                    sensor: config.name.clone(),
                })?;
                Ok(AnyLidarSource::Replay(ReplayLidarSource::from_dataset(
                    dataset,
                    &config.name,
                )?))
            }
        }
    }

    fn build_movement(
        config: &MovementSensorConfig,
        dataset: Option<&ReplayDataset>,
    ) -> Result<AnyMovementSource> {
        let capabilities = config.capabilities();
        match config.source {
            SourceKind::Mock => {
                let frequency = config
                    .data_frequency_hz
                    .ok_or_else(|| SourceLoadError::MissingFrequency {
                        sensor: config.name.clone(),
                    })?;
                let mock =
                    MockConfig::from_attributes(&config.name, frequency, &config.attributes)?;
                Ok(AnyMovementSource::Mock(MockMovementSource::new(
                    &config.name,
                    capabilities,
                    mock,
                )))
            }
            SourceKind::Replay => {
                let dataset = dataset.ok_or_else(|| SourceLoadError::MissingReplayPath {
                    sensor: config.name.clone(),
                })?;
                Ok(AnyMovementSource::Replay(ReplayMovementSource::from_dataset(
                    dataset,
                    &config.name,
                    capabilities,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EngineConfig, IngestionMode, ReplayConfig, SessionConfig};
    use std::collections::HashMap;

    fn blueprint(mode: IngestionMode, source: SourceKind) -> IngestionBlueprint {
        IngestionBlueprint {
            version: Default::default(),
            session: SessionConfig {
                mode,
                submission_timeout_ms: 1000,
            },
            lidar: LidarConfig {
                name: "lidar".into(),
                source,
                data_frequency_hz: Some(10.0),
                attributes: HashMap::new(),
            },
            movement_sensor: Some(MovementSensorConfig {
                name: "base".into(),
                source,
                data_frequency_hz: Some(50.0),
                imu_supported: true,
                odometer_supported: false,
                attributes: HashMap::new(),
            }),
            replay: None,
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn test_build_mock_sources() {
        let sources =
            SourceFactory::build(&blueprint(IngestionMode::Online, SourceKind::Mock)).unwrap();
        assert!(matches!(sources.lidar, AnyLidarSource::Mock(_)));
        let movement = sources.movement.unwrap();
        assert_eq!(movement.name(), "base");
        assert_eq!(movement.capabilities(), MovementCapabilities::IMU_ONLY);
    }

    #[test]
    fn test_replay_without_path_fails() {
        let err = SourceFactory::build(&blueprint(IngestionMode::Offline, SourceKind::Replay))
            .unwrap_err();
        assert!(matches!(err, SourceLoadError::MissingReplayPath { .. }));
    }

    #[test]
    fn test_mock_without_frequency_fails() {
        let mut config = blueprint(IngestionMode::Online, SourceKind::Mock);
        config.lidar.data_frequency_hz = None;
        assert!(matches!(
            SourceFactory::build(&config),
            Err(SourceLoadError::MissingFrequency { .. })
        ));
    }

    #[test]
    fn test_build_replay_sources() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("1.pcd"), b"scan").unwrap();
        std::fs::write(
            dir.path().join(crate::replay::RECORD_FILE),
            [
                serde_json::json!({
                    "sensor_id": "lidar",
                    "sensor_type": "lidar",
                    "timestamp": 1.0,
                    "data_file": "1.pcd",
                }),
                serde_json::json!({
                    "sensor_id": "base",
                    "sensor_type": "imu",
                    "timestamp": 1.0,
                    "accelerometer": [0.0, 0.0, 9.81],
                    "gyroscope": [0.0, 0.0, 0.0],
                }),
            ]
            .map(|record| record.to_string())
            .join("\n"),
        )
        .unwrap();

        let mut config = blueprint(IngestionMode::Offline, SourceKind::Replay);
        config.replay = Some(ReplayConfig {
            path: dir.path().to_path_buf(),
        });
        let sources = SourceFactory::build(&config).unwrap();
        assert!(matches!(
            sources.lidar,
            AnyLidarSource::Replay(ref s) if s.remaining() == 1
        ));
        assert!(matches!(
            sources.movement,
            Some(AnyMovementSource::Replay(ref s)) if s.remaining() == 1
        ));
    }
}
