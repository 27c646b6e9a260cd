//! IngestionBlueprint - Config Loader output
//!
//! Describes one ingestion run: operating mode, the lidar stream, an optional movement
//! sensor stream, where recorded data lives and how the mapping engine is set up.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::MovementCapabilities;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full ingestion blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Session settings
    pub session: SessionConfig,

    /// Lidar stream (required, the engine's primary synchronization source)
    pub lidar: LidarConfig,

    /// Movement sensor stream
    #[serde(default)]
    pub movement_sensor: Option<MovementSensorConfig>,

    /// Recorded dataset location (replay sources)
    #[serde(default)]
    pub replay: Option<ReplayConfig>,

    /// Mapping engine library settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Operating regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionMode {
    /// Live sensors, real-time cadence, best-effort delivery
    Online,
    /// Recorded dataset, zero-loss, order-exact delivery
    Offline,
}

impl IngestionMode {
    pub fn is_offline(&self) -> bool {
        matches!(self, IngestionMode::Offline)
    }
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    pub mode: IngestionMode,

    /// Per-call facade timeout (ms)
    #[serde(default = "default_submission_timeout_ms")]
    #[validate(range(min = 1))]
    pub submission_timeout_ms: u64,
}

fn default_submission_timeout_ms() -> u64 {
    5000
}

impl SessionConfig {
    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_timeout_ms)
    }
}

/// Lowest accepted data rate (one reading every ~17 minutes)
///
/// Slower rates would turn into poll intervals too long to represent.
pub const MIN_DATA_FREQUENCY_HZ: f64 = 0.001;

/// Where readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic live sensor, paced by `data_frequency_hz`
    Mock,
    /// Recorded dataset under `[replay].path`
    Replay,
}

/// Lidar stream
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LidarConfig {
    #[validate(length(min = 1))]
    pub name: String,

    pub source: SourceKind,

    /// Nominal data rate (online only)
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub data_frequency_hz: Option<f64>,

    /// Source specific attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Movement sensor stream
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovementSensorConfig {
    #[validate(length(min = 1))]
    pub name: String,

    pub source: SourceKind,

    /// Nominal data rate (online only)
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub data_frequency_hz: Option<f64>,

    #[serde(default)]
    pub imu_supported: bool,

    #[serde(default)]
    pub odometer_supported: bool,

    /// Source specific attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl MovementSensorConfig {
    pub fn capabilities(&self) -> MovementCapabilities {
        MovementCapabilities {
            imu_supported: self.imu_supported,
            odometer_supported: self.odometer_supported,
        }
    }
}

/// Recorded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Dataset directory containing `sensors.jsonl`
    pub path: PathBuf,
}

/// Mapping engine library settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Name of the map being built
    #[serde(default = "default_map_name")]
    #[validate(length(min = 1))]
    pub map_name: String,

    /// Timeout for the final optimization call (ms)
    #[serde(default = "default_final_optimization_timeout_ms")]
    #[validate(range(min = 1))]
    pub final_optimization_timeout_ms: u64,
}

fn default_map_name() -> String {
    "map".to_string()
}

fn default_final_optimization_timeout_ms() -> u64 {
    60_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            map_name: default_map_name(),
            final_optimization_timeout_ms: default_final_optimization_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn final_optimization_timeout(&self) -> Duration {
        Duration::from_millis(self.final_optimization_timeout_ms)
    }
}

impl IngestionBlueprint {
    /// Names of every configured stream, lidar first
    pub fn sensor_names(&self) -> Vec<&str> {
        std::iter::once(self.lidar.name.as_str())
            .chain(self.movement_sensor.as_ref().map(|m| m.name.as_str()))
            .collect()
    }

    /// True if any configured stream reads from the recorded dataset
    pub fn uses_replay(&self) -> bool {
        self.lidar.source == SourceKind::Replay
            || self
                .movement_sensor
                .as_ref()
                .is_some_and(|m| m.source == SourceKind::Replay)
    }
}
