//! Sensor source traits - pull-based reading producers
//!
//! A source hands out one reading per call. Two personalities implement these traits:
//!
//! - **live**: cadence-bound, never exhausts; every error is a genuine fault
//! - **replay**: delivers recorded readings in time order, then returns
//!   [`SourceError::EndOfDataset`] forever
//!
//! Readings from one source are produced in non-decreasing [`crate::ReadingTime`]
//! order; consumers never re-order them.

use crate::{MovementCapabilities, SourceError, TimedLidarReading, TimedMovementSensorReading};

/// Lidar scan producer
#[trait_variant::make(LidarSource: Send)]
pub trait LocalLidarSource {
    /// Sensor name, forwarded to the mapping engine with every submission
    fn name(&self) -> &str;

    /// Poll the next scan
    ///
    /// # Errors
    /// [`SourceError::EndOfDataset`] once a replay source is exhausted, any other
    /// variant for faults.
    async fn next_reading(&mut self) -> Result<TimedLidarReading, SourceError>;
}

/// Movement sensor (IMU and/or odometer) producer
#[trait_variant::make(MovementSensorSource: Send)]
pub trait LocalMovementSensorSource {
    /// Sensor name, forwarded to the mapping engine with every submission
    fn name(&self) -> &str;

    /// Advertised capability set
    fn capabilities(&self) -> MovementCapabilities;

    /// Poll the next movement bundle
    ///
    /// # Errors
    /// Same contract as [`LidarSource::next_reading`].
    async fn next_reading(&mut self) -> Result<TimedMovementSensorReading, SourceError>;
}
