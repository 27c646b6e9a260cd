//! # Integration Tests
//!
//! Cross-crate end-to-end scenarios.
//!
//! Covers:
//! - Config file → replay dataset → offline merge → locked facade
//! - Online mock streams against a contended facade
//! - Facade lifecycle (terminated library)

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert!(contracts::MovementCapabilities::BOTH.imu_supported);
    }
}

#[cfg(test)]
mod support {
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use contracts::{
        EngineError, MappingEngine, ReadingTime, TimedImuReading, TimedLidarReading,
        TimedOdometerReading,
    };
    use serde_json::json;
    use tempfile::TempDir;

    /// Delegating engine that records every accepted call in order
    pub struct RecordingEngine<E> {
        inner: E,
        accepted: Mutex<Vec<(&'static str, ReadingTime)>>,
    }

    impl<E> RecordingEngine<E> {
        pub fn new(inner: E) -> Self {
            Self {
                inner,
                accepted: Mutex::new(Vec::new()),
            }
        }

        pub fn inner(&self) -> &E {
            &self.inner
        }

        pub fn accepted(&self) -> Vec<(&'static str, ReadingTime)> {
            self.accepted.lock().unwrap().clone()
        }

        fn record(&self, kind: &'static str, time: ReadingTime, result: &Result<(), EngineError>) {
            if result.is_ok() {
                self.accepted.lock().unwrap().push((kind, time));
            }
        }
    }

    impl<E: MappingEngine + Sync> MappingEngine for RecordingEngine<E> {
        async fn add_lidar_reading(
            &self,
            timeout: Duration,
            sensor_name: &str,
            reading: &TimedLidarReading,
        ) -> Result<(), EngineError> {
            let result = self
                .inner
                .add_lidar_reading(timeout, sensor_name, reading)
                .await;
            self.record("lidar", reading.time, &result);
            result
        }

        async fn add_imu_reading(
            &self,
            timeout: Duration,
            sensor_name: &str,
            reading: &TimedImuReading,
        ) -> Result<(), EngineError> {
            let result = self
                .inner
                .add_imu_reading(timeout, sensor_name, reading)
                .await;
            self.record("imu", reading.time, &result);
            result
        }

        async fn add_odometer_reading(
            &self,
            timeout: Duration,
            sensor_name: &str,
            reading: &TimedOdometerReading,
        ) -> Result<(), EngineError> {
            let result = self
                .inner
                .add_odometer_reading(timeout, sensor_name, reading)
                .await;
            self.record("odometer", reading.time, &result);
            result
        }

        async fn run_final_optimization(&self, timeout: Duration) -> Result<(), EngineError> {
            self.inner.run_final_optimization(timeout).await
        }
    }

    /// Dataset: lidar every 100 ms from 0.1 s, imu + odometer every 50 ms from 0.05 s
    pub fn write_dataset(dir: &Path, lidar_times: &[f64], movement_times: &[f64]) {
        fs::create_dir_all(dir.join("lidar")).unwrap();
        let mut lines = Vec::new();

        for (i, t) in lidar_times.iter().enumerate() {
            let file = format!("lidar/{i:06}.pcd");
            fs::write(dir.join(&file), vec![7u8; 64]).unwrap();
            lines.push(json!({
                "sensor_id": "front_lidar",
                "sensor_type": "lidar",
                "timestamp": t,
                "data_file": file,
            }));
        }
        for t in movement_times {
            lines.push(json!({
                "sensor_id": "base",
                "sensor_type": "imu",
                "timestamp": t,
                "accelerometer": [0.0, 0.0, 9.81],
                "gyroscope": [0.0, 0.0, 0.01],
            }));
            lines.push(json!({
                "sensor_id": "base",
                "sensor_type": "odometer",
                "timestamp": t,
                "latitude": 40.7,
                "longitude": -74.0,
            }));
        }
        lines.push(json!({"sensor_id": "cam", "sensor_type": "camera", "timestamp": 0.1}));

        let records: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
        fs::write(dir.join(sensor_sources::RECORD_FILE), records.join("\n")).unwrap();
    }

    pub fn offline_config(dataset: &Path) -> String {
        format!(
            r#"
[session]
mode = "offline"
submission_timeout_ms = 1000

[lidar]
name = "front_lidar"
source = "replay"

[movement_sensor]
name = "base"
source = "replay"
imu_supported = true
odometer_supported = true

[replay]
path = "{}"

[engine]
map_name = "e2e_map"
final_optimization_timeout_ms = 5000
"#,
            dataset.display()
        )
    }

    pub fn online_config(lidar_hz: f64, movement_hz: f64) -> String {
        format!(
            r#"
[session]
mode = "online"
submission_timeout_ms = 200

[lidar]
name = "front_lidar"
source = "mock"
data_frequency_hz = {lidar_hz}
attributes = {{ scan_points = "256" }}

[movement_sensor]
name = "base"
source = "mock"
data_frequency_hz = {movement_hz}
imu_supported = true
odometer_supported = true
"#
        )
    }

    pub fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("ingest.toml");
        fs::write(&path, content).unwrap();
        path
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{IngestionMode, MappingEngine, ReadingTime, TimedImuReading, Vector3};
    use ingestion::{IngestionConfig, IngestionSupervisor, LoopOutcome, OFFLINE_TASK};
    use mapping_facade::{EngineLibrary, InMemoryConfig, InMemoryMapBuilder, LockedMappingFacade};
    use sensor_sources::{SensorSources, SourceFactory};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use crate::support::{
        offline_config, online_config, write_config, write_dataset, RecordingEngine,
    };

    type Facade = LockedMappingFacade<InMemoryMapBuilder>;

    const LIDAR: [f64; 4] = [0.1, 0.2, 0.3, 0.4];
    const MOVEMENT: [f64; 7] = [0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35];

    fn facade(blueprint: &contracts::IngestionBlueprint, config: InMemoryConfig) -> Facade {
        let library = Arc::new(EngineLibrary::init(blueprint.engine.clone()).unwrap());
        LockedMappingFacade::new(
            library,
            InMemoryMapBuilder::with_config(blueprint.engine.map_name.clone(), config),
        )
    }

    /// Config file → replay sources → offline merge → locked facade
    #[tokio::test]
    async fn test_e2e_offline_replay_pipeline() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("run1");
        write_dataset(&dataset, &LIDAR, &MOVEMENT);
        let config_path = write_config(&dir, &offline_config(&dataset));

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        assert_eq!(blueprint.session.mode, IngestionMode::Offline);

        let SensorSources { lidar, movement } = SourceFactory::build(&blueprint).unwrap();
        let inner = facade(&blueprint, InMemoryConfig::default());
        let engine = Arc::new(RecordingEngine::new(inner));
        let config = IngestionConfig::from_blueprint(&blueprint, engine.clone(), lidar, movement)
            .unwrap();

        let report = IngestionSupervisor::start(config, CancellationToken::new())
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.outcomes[OFFLINE_TASK], LoopOutcome::JobDone);

        // Movement runs out after 0.35 s, so the 0.4 s scan is never read
        let accepted = engine.accepted();
        let secs = |t: f64| ReadingTime::from_secs_f64(t);
        let expected = vec![
            ("lidar", secs(0.1)),
            ("imu", secs(0.1)),
            ("odometer", secs(0.1)),
            ("imu", secs(0.15)),
            ("odometer", secs(0.15)),
            ("lidar", secs(0.2)),
            ("imu", secs(0.2)),
            ("odometer", secs(0.2)),
            ("imu", secs(0.25)),
            ("odometer", secs(0.25)),
            ("lidar", secs(0.3)),
            ("imu", secs(0.3)),
            ("odometer", secs(0.3)),
            ("imu", secs(0.35)),
            ("odometer", secs(0.35)),
        ];
        assert_eq!(accepted, expected);

        let snapshot = engine.inner().snapshot().await;
        assert_eq!(snapshot.scans, 3);
        assert_eq!(snapshot.imu_samples, 6);
        assert_eq!(snapshot.odometer_samples, 6);
        assert_eq!(snapshot.point_cloud_bytes, 3 * 64);
        assert!(snapshot.optimized);

        assert_eq!(report.metrics.total_accepted, 15);
        assert_eq!(report.metrics.total_discarded, 1);
        assert_eq!(report.metrics.total_dropped, 0);
        assert_eq!(report.metrics.final_optimization, Some(true));
    }

    /// A second writer keeps the engine busy; the offline merge still loses nothing
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_offline_merge_survives_contention() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("run1");
        write_dataset(&dataset, &LIDAR, &MOVEMENT);
        let blueprint = ConfigLoader::load_from_str(
            &offline_config(&dataset),
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let SensorSources { lidar, movement } = SourceFactory::build(&blueprint).unwrap();
        let slow = InMemoryConfig {
            latency: Duration::from_millis(2),
            ..Default::default()
        };
        let engine = Arc::new(RecordingEngine::new(facade(&blueprint, slow)));

        let done = Arc::new(AtomicBool::new(false));
        let hog_accepted = Arc::new(AtomicU64::new(0));
        let hog = {
            let engine = engine.clone();
            let done = done.clone();
            let hog_accepted = hog_accepted.clone();
            tokio::spawn(async move {
                let mut n = 0i64;
                while !done.load(Ordering::SeqCst) {
                    let reading = TimedImuReading {
                        linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
                        angular_velocity: Vector3::default(),
                        time: ReadingTime::from_millis(n),
                    };
                    if engine
                        .inner()
                        .add_imu_reading(Duration::from_secs(1), "hog", &reading)
                        .await
                        .is_ok()
                    {
                        hog_accepted.fetch_add(1, Ordering::SeqCst);
                        n += 1;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let config = IngestionConfig::from_blueprint(&blueprint, engine.clone(), lidar, movement)
            .unwrap();
        let report = IngestionSupervisor::start(config, CancellationToken::new())
            .unwrap()
            .wait()
            .await
            .unwrap();
        done.store(true, Ordering::SeqCst);
        hog.await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.metrics.total_dropped, 0);

        let snapshot = engine.inner().snapshot().await;
        assert_eq!(snapshot.scans, 3);
        assert_eq!(snapshot.odometer_samples, 6);
        assert_eq!(
            snapshot.imu_samples,
            6 + hog_accepted.load(Ordering::SeqCst)
        );

        let accepted = engine.accepted();
        for pair in accepted.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "out of order: {accepted:?}");
        }
    }

    /// Online mock streams: every busy submission is dropped, never retried
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_online_mock_pipeline() {
        let blueprint = ConfigLoader::load_from_str(
            &online_config(100.0, 200.0),
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let SensorSources { lidar, movement } = SourceFactory::build(&blueprint).unwrap();
        let slow = InMemoryConfig {
            latency: Duration::from_millis(3),
            ..Default::default()
        };
        let engine = Arc::new(facade(&blueprint, slow));
        let config = IngestionConfig::from_blueprint(&blueprint, engine.clone(), lidar, movement)
            .unwrap();

        let token = CancellationToken::new();
        let supervisor = IngestionSupervisor::start(config, token.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
        let report = supervisor.wait().await.unwrap();

        assert_eq!(report.mode, IngestionMode::Online);
        assert_eq!(report.outcomes["front_lidar"], LoopOutcome::Cancelled);
        assert_eq!(report.outcomes["base"], LoopOutcome::Cancelled);

        let metrics = &report.metrics;
        assert_eq!(metrics.total_retries, 0);
        assert_eq!(metrics.total_dropped, metrics.total_lock_busy + metrics.total_failed);

        let snapshot = engine.snapshot().await;
        assert!(snapshot.scans > 0);
        assert!(!snapshot.optimized);
        assert_eq!(snapshot.total_submissions(), metrics.total_accepted);
    }

    /// Online loops keep running against a terminated library, dropping everything
    #[tokio::test]
    async fn test_e2e_terminated_library_drops_online() {
        let blueprint = ConfigLoader::load_from_str(
            &online_config(50.0, 50.0),
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let SensorSources { lidar, movement } = SourceFactory::build(&blueprint).unwrap();
        let engine = Arc::new(facade(&blueprint, InMemoryConfig::default()));
        assert!(engine.library().terminate());
        let config = IngestionConfig::from_blueprint(&blueprint, engine.clone(), lidar, movement)
            .unwrap();

        let token = CancellationToken::new();
        let supervisor = IngestionSupervisor::start(config, token.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        supervisor.cancel();
        let report = supervisor.wait().await.unwrap();

        assert_eq!(report.metrics.total_accepted, 0);
        assert!(report.metrics.total_failed > 0);
        assert_eq!(engine.snapshot().await.total_submissions(), 0);
    }
}
