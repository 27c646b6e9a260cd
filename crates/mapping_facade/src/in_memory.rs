//! In-memory stand-in engine
//!
//! Accumulates map state without running any mapping algorithm. Used by the CLI when
//! no native engine is linked, and by tests that need a realistic lock contract.

use std::collections::HashMap;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use contracts::{EngineError, ReadingTime, TimedImuReading, TimedLidarReading, TimedOdometerReading};
use tracing::{debug, info, trace};

use crate::builder::{MapBuilder, MapSnapshot};

/// In-memory engine configuration
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfig {
    /// Simulated processing cost of every call
    pub latency: Duration,

    /// Reject submissions after the final optimization
    pub freeze_after_optimization: bool,
}

/// In-memory map builder
#[derive(Debug, Default)]
pub struct InMemoryMapBuilder {
    config: InMemoryConfig,
    state: MapSnapshot,
    scans: Vec<Bytes>,
    /// Last accepted time per sensor name
    last_time: HashMap<String, ReadingTime>,
}

impl InMemoryMapBuilder {
    pub fn new(map_name: impl Into<String>) -> Self {
        Self::with_config(map_name, InMemoryConfig::default())
    }

    pub fn with_config(map_name: impl Into<String>, config: InMemoryConfig) -> Self {
        Self {
            config,
            state: MapSnapshot {
                map_name: map_name.into(),
                ..Default::default()
            },
            scans: Vec::new(),
            last_time: HashMap::new(),
        }
    }

    fn simulate_work(&self) {
        if !self.config.latency.is_zero() {
            std::thread::sleep(self.config.latency);
        }
    }

    fn check_open(&self, operation: &'static str) -> Result<(), EngineError> {
        if self.config.freeze_after_optimization && self.state.optimized {
            return Err(EngineError::rejected(operation, "map already finalized"));
        }
        Ok(())
    }

    /// Per-sensor time must not go backwards
    fn check_order(
        &self,
        operation: &'static str,
        sensor_name: &str,
        time: ReadingTime,
    ) -> Result<(), EngineError> {
        match self.last_time.get(sensor_name) {
            Some(&last) if time < last => Err(EngineError::rejected(
                operation,
                format!("reading at {time} precedes last accepted {last} for '{sensor_name}'"),
            )),
            _ => Ok(()),
        }
    }

    fn accept(&mut self, sensor_name: &str, time: ReadingTime) {
        self.last_time.insert(sensor_name.to_string(), time);
        self.state.last_reading_time = Some(match self.state.last_reading_time {
            Some(last) => last.max(time),
            None => time,
        });
    }
}

impl MapBuilder for InMemoryMapBuilder {
    fn add_lidar(
        &mut self,
        sensor_name: &str,
        reading: &TimedLidarReading,
    ) -> Result<(), EngineError> {
        const OP: &str = "add_lidar_reading";
        self.simulate_work();
        self.check_open(OP)?;
        if reading.scan.is_empty() {
            return Err(EngineError::rejected(OP, "empty scan"));
        }
        self.check_order(OP, sensor_name, reading.time)?;

        self.accept(sensor_name, reading.time);
        self.state.scans += 1;
        self.state.point_cloud_bytes += reading.scan.len() as u64;
        self.scans.push(reading.scan.clone());
        trace!(sensor = sensor_name, time = %reading.time, "scan accepted");
        Ok(())
    }

    fn add_imu(&mut self, sensor_name: &str, reading: &TimedImuReading) -> Result<(), EngineError> {
        const OP: &str = "add_imu_reading";
        self.simulate_work();
        self.check_open(OP)?;
        if !reading.linear_acceleration.is_finite() || !reading.angular_velocity.is_finite() {
            return Err(EngineError::rejected(OP, "non-finite imu sample"));
        }
        self.check_order(OP, sensor_name, reading.time)?;

        self.accept(sensor_name, reading.time);
        self.state.imu_samples += 1;
        trace!(sensor = sensor_name, time = %reading.time, "imu sample accepted");
        Ok(())
    }

    fn add_odometer(
        &mut self,
        sensor_name: &str,
        reading: &TimedOdometerReading,
    ) -> Result<(), EngineError> {
        const OP: &str = "add_odometer_reading";
        self.simulate_work();
        self.check_open(OP)?;
        let position_finite =
            reading.position.latitude.is_finite() && reading.position.longitude.is_finite();
        if !position_finite || !reading.orientation.is_finite() {
            return Err(EngineError::rejected(OP, "non-finite odometer sample"));
        }
        // Odometer and IMU sub-readings of one movement sensor share the sensor name
        let key = format!("{sensor_name}/odometer");
        self.check_order(OP, &key, reading.time)?;

        self.accept(&key, reading.time);
        self.state.odometer_samples += 1;
        self.state.latest_position = Some(reading.position);
        self.state.latest_orientation = Some(reading.orientation);
        trace!(sensor = sensor_name, time = %reading.time, "odometer sample accepted");
        Ok(())
    }

    fn run_final_optimization(&mut self) -> Result<(), EngineError> {
        self.simulate_work();
        if self.state.scans == 0 {
            return Err(EngineError::rejected(
                "run_final_optimization",
                "no scans to optimize",
            ));
        }
        self.state.optimized = true;
        info!(
            map = %self.state.map_name,
            scans = self.state.scans,
            imu_samples = self.state.imu_samples,
            odometer_samples = self.state.odometer_samples,
            "final optimization complete"
        );
        Ok(())
    }

    fn snapshot(&self) -> MapSnapshot {
        self.state.clone()
    }

    fn point_cloud_map(&self) -> Bytes {
        let mut map = BytesMut::with_capacity(self.state.point_cloud_bytes as usize);
        for scan in &self.scans {
            map.extend_from_slice(scan);
        }
        debug!(bytes = map.len(), scans = self.scans.len(), "point cloud exported");
        map.freeze()
    }
}
