//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: reading types,
//! the pull-based sensor source traits, the mapping engine facade trait, the error
//! taxonomy and the configuration blueprint.
//!
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every reading carries one absolute [`ReadingTime`] (integer nanoseconds)
//! - Readings from one source arrive in non-decreasing time order

mod blueprint;
mod error;
mod mapping_engine;
mod reading;
mod sensor_source;

pub use blueprint::*;
pub use error::*;
pub use mapping_engine::{LocalMappingEngine, MappingEngine};
pub use reading::*;
pub use sensor_source::{
    LidarSource, LocalLidarSource, LocalMovementSensorSource, MovementSensorSource,
};
