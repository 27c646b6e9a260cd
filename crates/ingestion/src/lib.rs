//! # Ingestion Engine
//!
//! Pulls readings from the sensor sources and submits them to the mapping engine in an
//! order it accepts.
//!
//! Responsibilities:
//! - Online: one paced loop per stream, single-attempt submission, drop on failure
//! - Offline: one sequential merge of lidar and movement readings by time, retry until
//!   accepted, final optimization when a stream runs out
//! - Cancellation through a shared `CancellationToken`
//! - Per-stream metrics and the end-of-run report
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionConfig, IngestionSupervisor};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = IngestionConfig::offline(engine, lidar).with_movement(imu, None);
//! let supervisor = IngestionSupervisor::start(config, CancellationToken::new())?;
//! let report = supervisor.wait().await?;
//! println!("{report}");
//! ```

mod config;
mod error;
mod metrics;
mod offline;
mod online;
mod rate;
mod submit;
mod supervisor;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{IngestionConfig, IngestionSettings, StreamConfig};
pub use error::{IngestionError, Result};
pub use metrics::IngestionMetrics;
pub use offline::OfflineMergeEngine;
pub use online::{run_lidar_loop, run_movement_loop, LoopOutcome};
pub use rate::{nominal_interval, time_to_sleep, RateController};
pub use supervisor::{IngestionReport, IngestionSupervisor, OFFLINE_TASK};
