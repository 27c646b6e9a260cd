//! MappingEngine trait - facade over the opaque mapping engine
//!
//! The engine accepts one submission at a time. A call made while another one is in
//! flight returns [`EngineError::LockBusy`] instead of blocking the caller; callers
//! decide whether busy means "drop" (online) or "try again" (offline).

use std::time::Duration;

use crate::{EngineError, TimedImuReading, TimedLidarReading, TimedOdometerReading};

/// Mapping engine facade
#[trait_variant::make(MappingEngine: Send)]
pub trait LocalMappingEngine {
    /// Submit one lidar scan
    async fn add_lidar_reading(
        &self,
        timeout: Duration,
        sensor_name: &str,
        reading: &TimedLidarReading,
    ) -> Result<(), EngineError>;

    /// Submit one IMU sample
    async fn add_imu_reading(
        &self,
        timeout: Duration,
        sensor_name: &str,
        reading: &TimedImuReading,
    ) -> Result<(), EngineError>;

    /// Submit one odometer sample
    async fn add_odometer_reading(
        &self,
        timeout: Duration,
        sensor_name: &str,
        reading: &TimedOdometerReading,
    ) -> Result<(), EngineError>;

    /// Run the one-time global optimization after an offline dataset is ingested
    async fn run_final_optimization(&self, timeout: Duration) -> Result<(), EngineError>;
}
