//! Test doubles: scripted engine and sources

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    EngineError, GeoPoint, LidarSource, MappingEngine, MovementCapabilities, MovementSensorSource,
    Orientation, ReadingTime, SourceError, TimedImuReading, TimedLidarReading,
    TimedMovementSensorReading, TimedOdometerReading, Vector3,
};

pub(crate) fn lidar_at(millis: i64) -> TimedLidarReading {
    TimedLidarReading {
        scan: Bytes::from_static(b"scan"),
        time: ReadingTime::from_millis(millis),
    }
}

pub(crate) fn imu_at(millis: i64) -> TimedImuReading {
    TimedImuReading {
        linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
        angular_velocity: Vector3::default(),
        time: ReadingTime::from_millis(millis),
    }
}

pub(crate) fn odometer_at(millis: i64) -> TimedOdometerReading {
    TimedOdometerReading {
        position: GeoPoint {
            latitude: 40.0,
            longitude: -74.0,
        },
        orientation: Orientation::default(),
        time: ReadingTime::from_millis(millis),
    }
}

pub(crate) fn movement_imu(millis: i64) -> TimedMovementSensorReading {
    TimedMovementSensorReading::imu(imu_at(millis))
}

pub(crate) fn movement_both(millis: i64) -> TimedMovementSensorReading {
    TimedMovementSensorReading {
        capabilities: MovementCapabilities::BOTH,
        imu: Some(imu_at(millis)),
        odometer: Some(odometer_at(millis)),
    }
}

/// One accepted engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub kind: &'static str,
    pub sensor: String,
    pub time: ReadingTime,
}

impl Call {
    pub fn lidar(sensor: &str, millis: i64) -> Self {
        Self::new("lidar", sensor, millis)
    }

    pub fn imu(sensor: &str, millis: i64) -> Self {
        Self::new("imu", sensor, millis)
    }

    pub fn odometer(sensor: &str, millis: i64) -> Self {
        Self::new("odometer", sensor, millis)
    }

    fn new(kind: &'static str, sensor: &str, millis: i64) -> Self {
        Self {
            kind,
            sensor: sensor.to_string(),
            time: ReadingTime::from_millis(millis),
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    script: VecDeque<Result<(), EngineError>>,
    calls: usize,
    accepted: Vec<Call>,
    final_optimizations: usize,
}

/// Engine answering from a script, then accepting everything
#[derive(Debug, Default)]
pub(crate) struct ScriptedEngine {
    state: Mutex<EngineState>,
    latency: Duration,
}

impl ScriptedEngine {
    pub fn with_script(script: impl IntoIterator<Item = Result<(), EngineError>>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                script: script.into_iter().collect(),
                ..Default::default()
            }),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn accepted(&self) -> Vec<Call> {
        self.state.lock().unwrap().accepted.clone()
    }

    pub fn final_optimizations(&self) -> usize {
        self.state.lock().unwrap().final_optimizations
    }

    async fn answer(&self, call: Option<Call>) -> Result<(), EngineError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let result = state.script.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            match call {
                Some(call) => state.accepted.push(call),
                None => state.final_optimizations += 1,
            }
        }
        result
    }
}

impl MappingEngine for ScriptedEngine {
    async fn add_lidar_reading(
        &self,
        _timeout: Duration,
        sensor_name: &str,
        reading: &TimedLidarReading,
    ) -> Result<(), EngineError> {
        let call = Call {
            kind: "lidar",
            sensor: sensor_name.to_string(),
            time: reading.time,
        };
        self.answer(Some(call)).await
    }

    async fn add_imu_reading(
        &self,
        _timeout: Duration,
        sensor_name: &str,
        reading: &TimedImuReading,
    ) -> Result<(), EngineError> {
        let call = Call {
            kind: "imu",
            sensor: sensor_name.to_string(),
            time: reading.time,
        };
        self.answer(Some(call)).await
    }

    async fn add_odometer_reading(
        &self,
        _timeout: Duration,
        sensor_name: &str,
        reading: &TimedOdometerReading,
    ) -> Result<(), EngineError> {
        let call = Call {
            kind: "odometer",
            sensor: sensor_name.to_string(),
            time: reading.time,
        };
        self.answer(Some(call)).await
    }

    async fn run_final_optimization(&self, _timeout: Duration) -> Result<(), EngineError> {
        self.answer(None).await
    }
}

/// Replay-like lidar source over a fixed script
#[derive(Debug)]
pub(crate) struct ScriptedLidarSource {
    name: String,
    items: VecDeque<Result<TimedLidarReading, SourceError>>,
    polls: Arc<AtomicUsize>,
}

impl ScriptedLidarSource {
    pub fn from_times(name: &str, times: &[i64]) -> Self {
        Self::from_script(name, times.iter().map(|&t| Ok(lidar_at(t))))
    }

    pub fn from_script(
        name: &str,
        items: impl IntoIterator<Item = Result<TimedLidarReading, SourceError>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            items: items.into_iter().collect(),
            polls: Arc::default(),
        }
    }

    /// Shared poll counter, readable after the source moved into a task
    pub fn polls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }
}

impl LidarSource for ScriptedLidarSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_reading(&mut self) -> Result<TimedLidarReading, SourceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.items
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::end_of_dataset(&self.name)))
    }
}

/// Replay-like movement source over a fixed script
#[derive(Debug)]
pub(crate) struct ScriptedMovementSource {
    name: String,
    capabilities: MovementCapabilities,
    items: VecDeque<Result<TimedMovementSensorReading, SourceError>>,
    polls: Arc<AtomicUsize>,
}

impl ScriptedMovementSource {
    /// IMU-only readings at the given times
    pub fn imu_times(name: &str, times: &[i64]) -> Self {
        Self::from_script(
            name,
            MovementCapabilities::IMU_ONLY,
            times.iter().map(|&t| Ok(movement_imu(t))),
        )
    }

    pub fn from_script(
        name: &str,
        capabilities: MovementCapabilities,
        items: impl IntoIterator<Item = Result<TimedMovementSensorReading, SourceError>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            capabilities,
            items: items.into_iter().collect(),
            polls: Arc::default(),
        }
    }

    pub fn polls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }
}

impl MovementSensorSource for ScriptedMovementSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> MovementCapabilities {
        self.capabilities
    }

    async fn next_reading(&mut self) -> Result<TimedMovementSensorReading, SourceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.items
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::end_of_dataset(&self.name)))
    }
}
