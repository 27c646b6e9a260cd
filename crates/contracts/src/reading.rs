//! Timed sensor readings - Sensor Source output
//!
//! Every reading carries exactly one immutable [`ReadingTime`]. Readings are created by
//! a source on each poll, consumed once by a submission and then dropped.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Absolute reading timestamp (nanoseconds since the Unix epoch)
///
/// Integer nanoseconds give a total order, so equal timestamps compare equal and
/// the lidar-first tie rule of the offline merge is well defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingTime(i64);

impl ReadingTime {
    /// Unix epoch
    pub const EPOCH: ReadingTime = ReadingTime(0);

    /// From nanoseconds since the epoch
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// From milliseconds since the epoch
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// From fractional seconds since the epoch (replay record format)
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * 1e9).round() as i64)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let since_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self(since_epoch.as_nanos().min(i64::MAX as u128) as i64)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Elapsed time since `earlier`, zero if `earlier` is later
    pub fn saturating_since(&self, earlier: ReadingTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0).max(0) as u64)
    }
}

impl fmt::Display for ReadingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Lidar scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedLidarReading {
    /// Opaque scan payload, passed through to the engine untouched
    pub scan: Bytes,

    pub time: ReadingTime,
}

/// IMU sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedImuReading {
    /// Linear acceleration (m/s²)
    pub linear_acceleration: Vector3,

    /// Angular velocity (rad/s)
    pub angular_velocity: Vector3,

    pub time: ReadingTime,
}

/// 2D geographic position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude (degrees)
    pub latitude: f64,

    /// Longitude (degrees)
    pub longitude: f64,
}

/// Unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

/// Orientation vector: axis (ox, oy, oz) plus rotation `theta` (degrees) about it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationVector {
    pub ox: f64,
    pub oy: f64,
    pub oz: f64,
    pub theta: f64,
}

/// Odometer orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Quaternion(Quaternion),
    OrientationVector(OrientationVector),
}

impl Orientation {
    pub fn is_finite(&self) -> bool {
        match self {
            Orientation::Quaternion(q) => {
                q.w.is_finite() && q.x.is_finite() && q.y.is_finite() && q.z.is_finite()
            }
            Orientation::OrientationVector(o) => {
                o.ox.is_finite() && o.oy.is_finite() && o.oz.is_finite() && o.theta.is_finite()
            }
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Quaternion(Quaternion::default())
    }
}

/// Odometry sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedOdometerReading {
    pub position: GeoPoint,
    pub orientation: Orientation,
    pub time: ReadingTime,
}

/// What a movement sensor can report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementCapabilities {
    pub imu_supported: bool,
    pub odometer_supported: bool,
}

impl MovementCapabilities {
    pub const IMU_ONLY: Self = Self {
        imu_supported: true,
        odometer_supported: false,
    };

    pub const ODOMETER_ONLY: Self = Self {
        imu_supported: false,
        odometer_supported: true,
    };

    pub const BOTH: Self = Self {
        imu_supported: true,
        odometer_supported: true,
    };

    /// True if the sensor reports nothing usable
    pub fn is_empty(&self) -> bool {
        !self.imu_supported && !self.odometer_supported
    }
}

/// Movement sensor bundle: optional IMU and/or odometer sub-readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedMovementSensorReading {
    pub capabilities: MovementCapabilities,
    pub imu: Option<TimedImuReading>,
    pub odometer: Option<TimedOdometerReading>,
}

impl TimedMovementSensorReading {
    /// Bundle holding only an IMU sample
    pub fn imu(reading: TimedImuReading) -> Self {
        Self {
            capabilities: MovementCapabilities::IMU_ONLY,
            imu: Some(reading),
            odometer: None,
        }
    }

    /// Bundle holding only an odometer sample
    pub fn odometer(reading: TimedOdometerReading) -> Self {
        Self {
            capabilities: MovementCapabilities::ODOMETER_ONLY,
            imu: None,
            odometer: Some(reading),
        }
    }

    /// Merge timestamp of the bundle
    ///
    /// The IMU sub-reading wins when both are present. `None` means the bundle
    /// carries no sub-reading at all.
    pub fn reading_time(&self) -> Option<ReadingTime> {
        self.imu
            .map(|imu| imu.time)
            .or_else(|| self.odometer.map(|odometer| odometer.time))
    }
}
