//! LockedMappingFacade - async, try-lock facade over a synchronous [`MapBuilder`]
//!
//! One submission runs at a time. A second caller does not queue behind the first; it
//! gets [`EngineError::LockBusy`] straight away. The engine call runs on a blocking
//! thread and is bounded by the per-call timeout. On timeout the caller is released
//! but the lock stays held until the engine call itself returns.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    EngineError, GeoPoint, MappingEngine, Orientation, TimedImuReading, TimedLidarReading,
    TimedOdometerReading,
};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::builder::{MapBuilder, MapSnapshot};
use crate::error::Result;
use crate::library::EngineLibrary;

/// Mapping engine facade with try-lock submission semantics
pub struct LockedMappingFacade<B> {
    library: Arc<EngineLibrary>,
    builder: Arc<Mutex<B>>,
}

impl<B> Clone for LockedMappingFacade<B> {
    fn clone(&self) -> Self {
        Self {
            library: Arc::clone(&self.library),
            builder: Arc::clone(&self.builder),
        }
    }
}

impl<B: MapBuilder> LockedMappingFacade<B> {
    pub fn new(library: Arc<EngineLibrary>, builder: B) -> Self {
        Self {
            library,
            builder: Arc::new(Mutex::new(builder)),
        }
    }

    pub fn library(&self) -> &Arc<EngineLibrary> {
        &self.library
    }

    /// Run one engine call under the submission lock
    async fn call<T, F>(
        &self,
        operation: &'static str,
        timeout: Duration,
        f: F,
    ) -> std::result::Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut B) -> std::result::Result<T, EngineError> + Send + 'static,
    {
        self.library.ensure_active()?;

        let mut guard = Arc::clone(&self.builder)
            .try_lock_owned()
            .map_err(|_| EngineError::LockBusy)?;

        let task = tokio::task::spawn_blocking(move || f(&mut *guard));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                warn!(operation, error = %join_error, "engine call aborted");
                Err(EngineError::rejected(
                    operation,
                    format!("engine call aborted: {join_error}"),
                ))
            }
            Err(_) => {
                warn!(operation, ?timeout, "engine call timed out");
                Err(EngineError::Timeout { operation, timeout })
            }
        }
    }

    /// Current map state
    ///
    /// Waits for an in-flight submission instead of reporting busy; queries are not
    /// subject to the submission drop policy.
    pub async fn snapshot(&self) -> MapSnapshot {
        self.builder.lock().await.snapshot()
    }

    /// Latest odometer pose, if any odometer sample was accepted
    pub async fn position(&self) -> Option<(GeoPoint, Orientation)> {
        let snapshot = self.snapshot().await;
        snapshot
            .latest_position
            .map(|position| (position, snapshot.latest_orientation.unwrap_or_default()))
    }

    /// Point cloud of every accepted scan
    pub async fn point_cloud_map(&self) -> Bytes {
        self.builder.lock().await.point_cloud_map()
    }

    /// Serialized internal engine state
    pub async fn internal_state(&self) -> Result<Vec<u8>> {
        let snapshot = self.snapshot().await;
        Ok(serde_json::to_vec(&snapshot)?)
    }
}

impl<B: MapBuilder> MappingEngine for LockedMappingFacade<B> {
    #[instrument(
        name = "facade_add_lidar",
        skip(self, reading),
        fields(sensor = sensor_name, reading_time = %reading.time)
    )]
    async fn add_lidar_reading(
        &self,
        timeout: Duration,
        sensor_name: &str,
        reading: &TimedLidarReading,
    ) -> std::result::Result<(), EngineError> {
        let name = sensor_name.to_string();
        let reading = reading.clone();
        self.call("add_lidar_reading", timeout, move |builder| {
            builder.add_lidar(&name, &reading)
        })
        .await
    }

    #[instrument(
        name = "facade_add_imu",
        skip(self, reading),
        fields(sensor = sensor_name, reading_time = %reading.time)
    )]
    async fn add_imu_reading(
        &self,
        timeout: Duration,
        sensor_name: &str,
        reading: &TimedImuReading,
    ) -> std::result::Result<(), EngineError> {
        let name = sensor_name.to_string();
        let reading = *reading;
        self.call("add_imu_reading", timeout, move |builder| {
            builder.add_imu(&name, &reading)
        })
        .await
    }

    #[instrument(
        name = "facade_add_odometer",
        skip(self, reading),
        fields(sensor = sensor_name, reading_time = %reading.time)
    )]
    async fn add_odometer_reading(
        &self,
        timeout: Duration,
        sensor_name: &str,
        reading: &TimedOdometerReading,
    ) -> std::result::Result<(), EngineError> {
        let name = sensor_name.to_string();
        let reading = *reading;
        self.call("add_odometer_reading", timeout, move |builder| {
            builder.add_odometer(&name, &reading)
        })
        .await
    }

    #[instrument(name = "facade_final_optimization", skip(self))]
    async fn run_final_optimization(
        &self,
        timeout: Duration,
    ) -> std::result::Result<(), EngineError> {
        debug!("running final optimization");
        self.call("run_final_optimization", timeout, |builder| {
            builder.run_final_optimization()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryConfig, InMemoryMapBuilder};
    use contracts::{EngineConfig, ReadingTime, Vector3};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn facade(latency: Duration) -> LockedMappingFacade<InMemoryMapBuilder> {
        let library = Arc::new(EngineLibrary::init(EngineConfig::default()).unwrap());
        let builder = InMemoryMapBuilder::with_config(
            "test",
            InMemoryConfig {
                latency,
                ..Default::default()
            },
        );
        LockedMappingFacade::new(library, builder)
    }

    fn scan_at(millis: i64) -> TimedLidarReading {
        TimedLidarReading {
            scan: Bytes::from_static(b"scan"),
            time: ReadingTime::from_millis(millis),
        }
    }

    #[tokio::test]
    async fn test_submissions_reach_builder() {
        let facade = facade(Duration::ZERO);
        facade
            .add_lidar_reading(TIMEOUT, "lidar", &scan_at(1))
            .await
            .unwrap();
        let imu = TimedImuReading {
            linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
            angular_velocity: Vector3::default(),
            time: ReadingTime::from_millis(2),
        };
        facade.add_imu_reading(TIMEOUT, "imu", &imu).await.unwrap();
        facade.run_final_optimization(TIMEOUT).await.unwrap();

        let snapshot = facade.snapshot().await;
        assert_eq!(snapshot.scans, 1);
        assert_eq!(snapshot.imu_samples, 1);
        assert!(snapshot.optimized);
        assert_eq!(facade.point_cloud_map().await, Bytes::from_static(b"scan"));
        assert!(facade.position().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_submission_reports_lock_busy() {
        let facade = facade(Duration::from_millis(200));
        let slow = facade.clone();
        let first = tokio::spawn(async move {
            slow.add_lidar_reading(TIMEOUT, "lidar", &scan_at(1)).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = facade.add_lidar_reading(TIMEOUT, "lidar", &scan_at(2)).await;
        assert_eq!(second, Err(EngineError::LockBusy));

        first.await.unwrap().unwrap();
        assert_eq!(facade.snapshot().await.scans, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_call_timeout() {
        let facade = facade(Duration::from_millis(300));
        let result = facade
            .add_lidar_reading(Duration::from_millis(20), "lidar", &scan_at(1))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::Timeout {
                operation: "add_lidar_reading",
                ..
            })
        ));

        // Still held by the engine call that outlived the caller
        let busy = facade.add_lidar_reading(TIMEOUT, "lidar", &scan_at(2)).await;
        assert_eq!(busy, Err(EngineError::LockBusy));
    }

    #[tokio::test]
    async fn test_terminated_library_rejects_calls() {
        let facade = facade(Duration::ZERO);
        facade.library().terminate();
        let result = facade.add_lidar_reading(TIMEOUT, "lidar", &scan_at(1)).await;
        assert_eq!(result, Err(EngineError::Terminated));
    }

    #[tokio::test]
    async fn test_internal_state_is_json() {
        let facade = facade(Duration::ZERO);
        facade
            .add_lidar_reading(TIMEOUT, "lidar", &scan_at(1))
            .await
            .unwrap();
        let state = facade.internal_state().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&state).unwrap();
        assert_eq!(value["scans"], 1);
        assert_eq!(value["map_name"], "test");
    }
}
