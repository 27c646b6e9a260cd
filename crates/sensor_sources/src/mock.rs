//! Mock live sources
//!
//! Synthetic sensors for development without hardware. They produce readings at a fixed
//! cadence, stamp them with the wall clock and never exhaust.
//!
//! Supported attributes:
//! - `scan_points`: points per lidar scan (16 bytes each, default 1024)
//! - `fault_every`: report a fault on every N-th poll

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    GeoPoint, LidarSource, MovementCapabilities, MovementSensorSource, Orientation, Quaternion,
    ReadingTime, SourceError, TimedImuReading, TimedLidarReading, TimedMovementSensorReading,
    TimedOdometerReading, Vector3, MIN_DATA_FREQUENCY_HZ,
};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Result, SourceLoadError};

const POINT_STRIDE: usize = 16;

/// Stand-in deadline when the frame interval overflows the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Data rate (Hz)
    pub frequency_hz: f64,

    /// Points per lidar scan
    pub scan_points: usize,

    /// Fault on every N-th poll
    pub fault_every: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            scan_points: 1024,
            fault_every: None,
        }
    }
}

impl MockConfig {
    /// Build from a stream's data rate and its attribute map
    pub fn from_attributes(
        sensor: &str,
        frequency_hz: f64,
        attributes: &HashMap<String, String>,
    ) -> Result<Self> {
        if !(frequency_hz.is_finite() && frequency_hz >= MIN_DATA_FREQUENCY_HZ) {
            return Err(SourceLoadError::invalid_attribute(
                sensor,
                "data_frequency_hz",
                format!("must be at least {MIN_DATA_FREQUENCY_HZ} Hz, got {frequency_hz}"),
            ));
        }

        let mut config = Self {
            frequency_hz,
            ..Default::default()
        };

        if let Some(value) = attributes.get("scan_points") {
            config.scan_points = parse_attribute(sensor, "scan_points", value)?;
        }
        if let Some(value) = attributes.get("fault_every") {
            let every: u64 = parse_attribute(sensor, "fault_every", value)?;
            if every == 0 {
                return Err(SourceLoadError::invalid_attribute(
                    sensor,
                    "fault_every",
                    "must be at least 1",
                ));
            }
            config.fault_every = Some(every);
        }

        Ok(config)
    }

    fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frequency_hz)
            .unwrap_or(Duration::MAX)
    }
}

fn parse_attribute<T: std::str::FromStr>(sensor: &str, key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| SourceLoadError::invalid_attribute(sensor, key, e.to_string()))
}

/// Frame clock shared by both mock sources
#[derive(Debug)]
struct Cadence {
    interval: Duration,
    next_due: Option<Instant>,
    polls: u64,
    fault_every: Option<u64>,
}

impl Cadence {
    fn new(config: &MockConfig) -> Self {
        Self {
            interval: config.interval(),
            next_due: None,
            polls: 0,
            fault_every: config.fault_every,
        }
    }

    /// Wait for the next frame; returns its frame number or an injected fault
    async fn tick(&mut self, sensor: &str) -> std::result::Result<u64, SourceError> {
        if let Some(due) = self.next_due {
            tokio::time::sleep_until(due).await;
        }
        let now = Instant::now();
        // A slow consumer skips frames instead of receiving a burst
        let next = self
            .next_due
            .and_then(|due| due.checked_add(self.interval))
            .filter(|next| *next > now)
            .or_else(|| now.checked_add(self.interval));
        self.next_due = Some(next.unwrap_or(now + FAR_FUTURE));

        self.polls += 1;
        if self.fault_every.is_some_and(|every| self.polls % every == 0) {
            debug!(sensor, poll = self.polls, "injected fault");
            return Err(SourceError::fault(sensor, "injected fault"));
        }
        Ok(self.polls)
    }
}

/// Synthetic live lidar
#[derive(Debug)]
pub struct MockLidarSource {
    name: String,
    config: MockConfig,
    cadence: Cadence,
}

impl MockLidarSource {
    pub fn new(name: impl Into<String>, config: MockConfig) -> Self {
        let cadence = Cadence::new(&config);
        Self {
            name: name.into(),
            config,
            cadence,
        }
    }
}

impl LidarSource for MockLidarSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_reading(&mut self) -> std::result::Result<TimedLidarReading, SourceError> {
        let frame = self.cadence.tick(&self.name).await?;
        let scan = vec![(frame % 251) as u8; self.config.scan_points * POINT_STRIDE];
        trace!(sensor = %self.name, frame, "mock scan");
        Ok(TimedLidarReading {
            scan: Bytes::from(scan),
            time: ReadingTime::now(),
        })
    }
}

/// Synthetic live IMU and/or odometer
#[derive(Debug)]
pub struct MockMovementSource {
    name: String,
    capabilities: MovementCapabilities,
    cadence: Cadence,
}

impl MockMovementSource {
    pub fn new(
        name: impl Into<String>,
        capabilities: MovementCapabilities,
        config: MockConfig,
    ) -> Self {
        let cadence = Cadence::new(&config);
        Self {
            name: name.into(),
            capabilities,
            cadence,
        }
    }
}

impl MovementSensorSource for MockMovementSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> MovementCapabilities {
        self.capabilities
    }

    async fn next_reading(
        &mut self,
    ) -> std::result::Result<TimedMovementSensorReading, SourceError> {
        let frame = self.cadence.tick(&self.name).await?;
        let time = ReadingTime::now();
        let step = frame as f64;

        let imu = self.capabilities.imu_supported.then(|| TimedImuReading {
            linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
            angular_velocity: Vector3::new(0.0, 0.0, 0.01),
            time,
        });
        let odometer = self.capabilities.odometer_supported.then(|| TimedOdometerReading {
            position: GeoPoint {
                latitude: 40.0 + step * 0.0001,
                longitude: -74.0 + step * 0.0001,
            },
            orientation: Orientation::Quaternion(Quaternion::default()),
            time,
        });

        Ok(TimedMovementSensorReading {
            capabilities: self.capabilities,
            imu,
            odometer,
        })
    }
}
