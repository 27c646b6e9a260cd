//! Replay sources - recorded dataset playback
//!
//! A dataset directory holds `sensors.jsonl`, one record per line:
//!
//! ```text
//! {"sensor_id":"front_lidar","sensor_type":"lidar","timestamp":0.10,"data_file":"lidar/1.pcd"}
//! {"sensor_id":"base","sensor_type":"imu","timestamp":0.10,"accelerometer":[0,0,9.81],"gyroscope":[0,0,0]}
//! {"sensor_id":"base","sensor_type":"odometer","timestamp":0.10,"latitude":40.7,"longitude":-74.0}
//! ```
//!
//! Records of other sensor types are ignored. Readings are handed out in timestamp
//! order with no pacing; once the last one is delivered every poll returns
//! [`SourceError::EndOfDataset`].

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use contracts::{
    GeoPoint, LidarSource, MovementCapabilities, MovementSensorSource, Orientation, ReadingTime,
    SourceError, TimedImuReading, TimedLidarReading, TimedMovementSensorReading,
    TimedOdometerReading, Vector3,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SourceLoadError};

/// Record index file inside a dataset directory
pub const RECORD_FILE: &str = "sensors.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordKind {
    Lidar,
    Imu,
    Odometer,
    #[serde(other)]
    Other,
}

/// One line of `sensors.jsonl`
#[derive(Debug, Clone, Deserialize)]
struct SensorRecord {
    sensor_id: String,
    sensor_type: RecordKind,
    timestamp: f64,

    // Lidar
    #[serde(default)]
    data_file: Option<String>,

    // IMU
    #[serde(default)]
    accelerometer: Option<[f64; 3]>,
    #[serde(default)]
    gyroscope: Option<[f64; 3]>,

    // Odometer
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    orientation: Option<Orientation>,

    #[serde(skip)]
    line: usize,
}

/// Parsed dataset, records grouped by sensor and sorted by time
#[derive(Debug, Clone)]
pub struct ReplayDataset {
    root: PathBuf,
    records: HashMap<String, Vec<SensorRecord>>,
}

impl ReplayDataset {
    /// Load `sensors.jsonl` from a dataset directory
    #[instrument(name = "replay_dataset_load", skip_all, fields(path = %root.display()))]
    pub fn load(root: &Path) -> Result<Self> {
        let root = root.to_path_buf();
        let index = root.join(RECORD_FILE);
        let content =
            std::fs::read_to_string(&index).map_err(|e| SourceLoadError::io(&index, e))?;

        let mut records: HashMap<String, Vec<SensorRecord>> = HashMap::new();
        let mut ignored = 0usize;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut record: SensorRecord = serde_json::from_str(line)
                .map_err(|source| SourceLoadError::Record { line: line_no, source })?;
            record.line = line_no;

            if record.sensor_type == RecordKind::Other {
                ignored += 1;
                continue;
            }
            if !record.timestamp.is_finite() {
                return Err(SourceLoadError::invalid_record(
                    record.sensor_id,
                    kind_name(record.sensor_type),
                    line_no,
                    "timestamp must be finite",
                ));
            }

            records
                .entry(record.sensor_id.clone())
                .or_default()
                .push(record);
        }

        // Stable sort keeps file order for equal timestamps
        for sensor_records in records.values_mut() {
            sensor_records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }

        info!(
            sensors = records.len(),
            records = records.values().map(Vec::len).sum::<usize>(),
            ignored,
            "loaded replay dataset"
        );

        Ok(Self { root, records })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of records for one sensor
    pub fn record_count(&self, sensor_id: &str) -> usize {
        self.records.get(sensor_id).map_or(0, Vec::len)
    }

    fn records_for(&self, sensor_id: &str) -> &[SensorRecord] {
        self.records
            .get(sensor_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn kind_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Lidar => "lidar",
        RecordKind::Imu => "imu",
        RecordKind::Odometer => "odometer",
        RecordKind::Other => "other",
    }
}

fn vector(values: [f64; 3]) -> Vector3 {
    Vector3::new(values[0], values[1], values[2])
}

#[derive(Debug, Clone)]
struct LidarRecord {
    time: ReadingTime,
    data_file: PathBuf,
}

/// Lidar scans from a recorded dataset
///
/// Scan payloads are read from disk on poll. A failed read is reported as a fault and
/// the same record is offered again on the next poll.
#[derive(Debug)]
pub struct ReplayLidarSource {
    name: String,
    pending: VecDeque<LidarRecord>,
    delivered: usize,
}

impl ReplayLidarSource {
    pub fn from_dataset(dataset: &ReplayDataset, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut pending = VecDeque::new();

        for record in dataset.records_for(&name) {
            match record.sensor_type {
                RecordKind::Lidar => {
                    let data_file = record.data_file.as_deref().ok_or_else(|| {
                        SourceLoadError::invalid_record(
                            &name,
                            "lidar",
                            record.line,
                            "missing data_file",
                        )
                    })?;
                    let path = dataset.root().join(data_file);
                    if !path.is_file() {
                        return Err(SourceLoadError::invalid_record(
                            &name,
                            "lidar",
                            record.line,
                            format!("data file {} does not exist", path.display()),
                        ));
                    }
                    pending.push_back(LidarRecord {
                        time: ReadingTime::from_secs_f64(record.timestamp),
                        data_file: path,
                    });
                }
                other => {
                    debug!(
                        sensor = %name,
                        kind = kind_name(other),
                        line = record.line,
                        "skipping non-lidar record"
                    );
                }
            }
        }

        if pending.is_empty() {
            warn!(
                sensor = %name,
                records = dataset.record_count(&name),
                "no lidar records in dataset"
            );
        }

        Ok(Self {
            name,
            pending,
            delivered: 0,
        })
    }

    /// Scans not yet delivered
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl LidarSource for ReplayLidarSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_reading(&mut self) -> std::result::Result<TimedLidarReading, SourceError> {
        let Some(record) = self.pending.front() else {
            return Err(SourceError::end_of_dataset(&self.name));
        };

        let scan = tokio::fs::read(&record.data_file).await.map_err(|e| {
            SourceError::fault(
                &self.name,
                format!("failed to read {}: {e}", record.data_file.display()),
            )
        })?;
        let reading = TimedLidarReading {
            scan: Bytes::from(scan),
            time: record.time,
        };

        self.pending.pop_front();
        self.delivered += 1;
        if self.pending.is_empty() {
            info!(sensor = %self.name, delivered = self.delivered, "lidar replay exhausted");
        }
        Ok(reading)
    }
}

/// Movement bundles from a recorded dataset
///
/// IMU and odometer records of one sensor with identical timestamps are merged into a
/// single bundle. Record types the sensor does not advertise are dropped at load.
#[derive(Debug)]
pub struct ReplayMovementSource {
    name: String,
    capabilities: MovementCapabilities,
    pending: VecDeque<TimedMovementSensorReading>,
}

impl ReplayMovementSource {
    pub fn from_dataset(
        dataset: &ReplayDataset,
        name: impl Into<String>,
        capabilities: MovementCapabilities,
    ) -> Result<Self> {
        let name = name.into();
        let mut pending: VecDeque<TimedMovementSensorReading> = VecDeque::new();
        let mut filtered = 0usize;

        for record in dataset.records_for(&name) {
            let time = ReadingTime::from_secs_f64(record.timestamp);
            match record.sensor_type {
                RecordKind::Imu if capabilities.imu_supported => {
                    let (Some(acc), Some(gyro)) = (record.accelerometer, record.gyroscope) else {
                        return Err(SourceLoadError::invalid_record(
                            &name,
                            "imu",
                            record.line,
                            "missing accelerometer or gyroscope",
                        ));
                    };
                    let imu = TimedImuReading {
                        linear_acceleration: vector(acc),
                        angular_velocity: vector(gyro),
                        time,
                    };
                    match pending.back_mut() {
                        Some(bundle) if bundle.imu.is_none() && bundle_time(bundle) == time => {
                            bundle.imu = Some(imu);
                            bundle.capabilities.imu_supported = true;
                        }
                        _ => pending.push_back(TimedMovementSensorReading::imu(imu)),
                    }
                }
                RecordKind::Odometer if capabilities.odometer_supported => {
                    let (Some(latitude), Some(longitude)) = (record.latitude, record.longitude)
                    else {
                        return Err(SourceLoadError::invalid_record(
                            &name,
                            "odometer",
                            record.line,
                            "missing latitude or longitude",
                        ));
                    };
                    let odometer = TimedOdometerReading {
                        position: GeoPoint {
                            latitude,
                            longitude,
                        },
                        orientation: record.orientation.unwrap_or_default(),
                        time,
                    };
                    match pending.back_mut() {
                        Some(bundle)
                            if bundle.odometer.is_none() && bundle_time(bundle) == time =>
                        {
                            bundle.odometer = Some(odometer);
                            bundle.capabilities.odometer_supported = true;
                        }
                        _ => pending.push_back(TimedMovementSensorReading::odometer(odometer)),
                    }
                }
                _ => filtered += 1,
            }
        }

        if filtered > 0 {
            debug!(sensor = %name, filtered, "dropped records outside advertised capabilities");
        }
        if pending.is_empty() {
            warn!(
                sensor = %name,
                records = dataset.record_count(&name),
                "no movement records in dataset"
            );
        }

        Ok(Self {
            name,
            capabilities,
            pending,
        })
    }

    /// Bundles not yet delivered
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

/// Time of a bundle under construction; it always holds at least one sub-reading
fn bundle_time(bundle: &TimedMovementSensorReading) -> ReadingTime {
    bundle.reading_time().unwrap_or(ReadingTime::EPOCH)
}

impl MovementSensorSource for ReplayMovementSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> MovementCapabilities {
        self.capabilities
    }

    async fn next_reading(
        &mut self,
    ) -> std::result::Result<TimedMovementSensorReading, SourceError> {
        self.pending
            .pop_front()
            .ok_or_else(|| SourceError::end_of_dataset(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn lidar_record(timestamp: f64, data_file: &str) -> String {
        json!({
            "sensor_id": "lidar",
            "sensor_type": "lidar",
            "timestamp": timestamp,
            "data_file": data_file,
        })
        .to_string()
    }

    fn imu_record(timestamp: f64) -> String {
        json!({
            "sensor_id": "base",
            "sensor_type": "imu",
            "timestamp": timestamp,
            "accelerometer": [0.0, 0.0, 9.81],
            "gyroscope": [0.0, 0.0, 0.0],
        })
        .to_string()
    }

    fn odometer_record(timestamp: f64, latitude: f64) -> String {
        json!({
            "sensor_id": "base",
            "sensor_type": "odometer",
            "timestamp": timestamp,
            "latitude": latitude,
            "longitude": -74.0,
        })
        .to_string()
    }

    fn write_dataset(lines: &[String], scans: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("lidar")).unwrap();
        for scan in scans {
            fs::write(dir.path().join(scan), b"points").unwrap();
        }
        fs::write(dir.path().join(RECORD_FILE), lines.join("\n")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_lidar_replay_in_time_order_then_exhausts() {
        let dir = write_dataset(
            &[
                lidar_record(0.2, "lidar/2.pcd"),
                lidar_record(0.1, "lidar/1.pcd"),
                r#"{"sensor_id":"cam","sensor_type":"camera","timestamp":0.1}"#.to_string(),
            ],
            &["lidar/1.pcd", "lidar/2.pcd"],
        );
        let dataset = ReplayDataset::load(dir.path()).unwrap();
        assert_eq!(dataset.record_count("lidar"), 2);
        assert_eq!(dataset.record_count("cam"), 0);

        let mut source = ReplayLidarSource::from_dataset(&dataset, "lidar").unwrap();
        let first = source.next_reading().await.unwrap();
        let second = source.next_reading().await.unwrap();
        assert_eq!(first.time, ReadingTime::from_millis(100));
        assert_eq!(second.time, ReadingTime::from_millis(200));
        assert_eq!(first.scan, Bytes::from_static(b"points"));

        let end = source.next_reading().await.unwrap_err();
        assert!(end.is_end_of_dataset());
        assert!(source.next_reading().await.unwrap_err().is_end_of_dataset());
    }

    #[tokio::test]
    async fn test_lidar_source_over_movement_records_is_empty() {
        let dir = write_dataset(&[imu_record(0.1), odometer_record(0.2, 40.7)], &[]);
        let dataset = ReplayDataset::load(dir.path()).unwrap();
        assert_eq!(dataset.record_count("base"), 2);

        let mut source = ReplayLidarSource::from_dataset(&dataset, "base").unwrap();
        assert!(source.next_reading().await.unwrap_err().is_end_of_dataset());
    }

    #[tokio::test]
    async fn test_missing_scan_at_poll_is_a_fault_and_not_skipped() {
        let dir = write_dataset(
            &[lidar_record(0.1, "lidar/1.pcd")],
            &["lidar/1.pcd"],
        );
        let dataset = ReplayDataset::load(dir.path()).unwrap();
        let mut source = ReplayLidarSource::from_dataset(&dataset, "lidar").unwrap();

        fs::remove_file(dir.path().join("lidar/1.pcd")).unwrap();
        let err = source.next_reading().await.unwrap_err();
        assert!(matches!(err, SourceError::Fault { .. }));
        assert_eq!(source.remaining(), 1);

        fs::write(dir.path().join("lidar/1.pcd"), b"back").unwrap();
        assert!(source.next_reading().await.is_ok());
    }

    #[test]
    fn test_lidar_record_without_file_is_rejected_at_load() {
        let dir = write_dataset(
            &[lidar_record(0.1, "lidar/nope.pcd")],
            &[],
        );
        let dataset = ReplayDataset::load(dir.path()).unwrap();
        let err = ReplayLidarSource::from_dataset(&dataset, "lidar").unwrap_err();
        assert!(matches!(err, SourceLoadError::InvalidRecord { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_movement_merges_equal_timestamps() {
        let dir = write_dataset(
            &[
                imu_record(0.1),
                odometer_record(0.1, 40.7),
                odometer_record(0.2, 40.8),
            ],
            &[],
        );
        let dataset = ReplayDataset::load(dir.path()).unwrap();
        let mut source =
            ReplayMovementSource::from_dataset(&dataset, "base", MovementCapabilities::BOTH)
                .unwrap();
        assert_eq!(source.remaining(), 2);

        let both = source.next_reading().await.unwrap();
        assert!(both.imu.is_some() && both.odometer.is_some());
        assert_eq!(both.capabilities, MovementCapabilities::BOTH);
        assert_eq!(both.reading_time(), Some(ReadingTime::from_millis(100)));

        let odometer_only = source.next_reading().await.unwrap();
        assert!(odometer_only.imu.is_none());
        assert_eq!(
            odometer_only.reading_time(),
            Some(ReadingTime::from_millis(200))
        );
        assert!(source.next_reading().await.unwrap_err().is_end_of_dataset());
    }

    #[test]
    fn test_movement_filters_by_capabilities() {
        let dir = write_dataset(
            &[imu_record(0.1), odometer_record(0.2, 40.7)],
            &[],
        );
        let dataset = ReplayDataset::load(dir.path()).unwrap();
        let source =
            ReplayMovementSource::from_dataset(&dataset, "base", MovementCapabilities::IMU_ONLY)
                .unwrap();
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn test_invalid_line_reports_line_number() {
        let dir = write_dataset(&[String::new(), "not json".to_string()], &[]);
        let err = ReplayDataset::load(dir.path()).unwrap_err();
        assert!(matches!(err, SourceLoadError::Record { line: 2, .. }));
    }

    #[test]
    fn test_missing_index_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ReplayDataset::load(dir.path()),
            Err(SourceLoadError::Io { .. })
        ));
    }
}
