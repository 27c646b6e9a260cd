//! MapBuilder trait - the synchronous, opaque engine boundary
//!
//! Any memory-layout or FFI marshalling for a native engine stays behind this trait;
//! the ingestion crates only ever see [`contracts::MappingEngine`].

use bytes::Bytes;
use contracts::{
    EngineError, GeoPoint, Orientation, ReadingTime, TimedImuReading, TimedLidarReading,
    TimedOdometerReading,
};
use serde::Serialize;

/// Synchronous mapping engine
///
/// Calls are serialized by [`crate::LockedMappingFacade`]; implementations never see
/// two calls at once.
pub trait MapBuilder: Send + 'static {
    fn add_lidar(
        &mut self,
        sensor_name: &str,
        reading: &TimedLidarReading,
    ) -> Result<(), EngineError>;

    fn add_imu(&mut self, sensor_name: &str, reading: &TimedImuReading) -> Result<(), EngineError>;

    fn add_odometer(
        &mut self,
        sensor_name: &str,
        reading: &TimedOdometerReading,
    ) -> Result<(), EngineError>;

    fn run_final_optimization(&mut self) -> Result<(), EngineError>;

    /// Current map state
    fn snapshot(&self) -> MapSnapshot;

    /// Point cloud assembled from accepted scans
    fn point_cloud_map(&self) -> Bytes;
}

/// Engine state visible to the outward query surface
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapSnapshot {
    pub map_name: String,

    /// Accepted lidar scans
    pub scans: u64,

    /// Accepted IMU samples
    pub imu_samples: u64,

    /// Accepted odometer samples
    pub odometer_samples: u64,

    /// Total bytes of accepted scan payloads
    pub point_cloud_bytes: u64,

    /// Latest odometer position
    pub latest_position: Option<GeoPoint>,

    /// Latest odometer orientation
    pub latest_orientation: Option<Orientation>,

    /// Newest reading time accepted on any stream
    pub last_reading_time: Option<ReadingTime>,

    /// Final optimization has run
    pub optimized: bool,
}

impl MapSnapshot {
    /// Total accepted submissions
    pub fn total_submissions(&self) -> u64 {
        self.scans + self.imu_samples + self.odometer_samples
    }
}
