//! # Sensor Sources
//!
//! Pull-based reading producers behind [`contracts::LidarSource`] and
//! [`contracts::MovementSensorSource`].
//!
//! - **replay**: recorded dataset (`sensors.jsonl` + scan files), exhausts with
//!   [`contracts::SourceError::EndOfDataset`]
//! - **mock**: synthetic live sensors paced by their data rate, never exhaust

pub mod error;
pub mod factory;
pub mod mock;
pub mod replay;

pub use error::{Result, SourceLoadError};
pub use factory::{AnyLidarSource, AnyMovementSource, SensorSources, SourceFactory};
pub use mock::{MockConfig, MockLidarSource, MockMovementSource};
pub use replay::{ReplayDataset, ReplayLidarSource, ReplayMovementSource, RECORD_FILE};
