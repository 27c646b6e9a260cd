//! Session statistics.

use ingestion::IngestionReport;
use mapping_facade::MapSnapshot;

/// What a finished session produced
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Per-task outcomes and ingestion metrics
    pub report: IngestionReport,

    /// Engine state after the run
    pub snapshot: MapSnapshot,
}

impl SessionStats {
    /// Accepted submissions per second
    pub fn throughput(&self) -> f64 {
        let secs = self.report.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.snapshot.total_submissions() as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.report);

        let map = &self.snapshot;
        println!("\n=== Map ===");
        println!("Map: {}", map.map_name);
        println!("Scans: {}", map.scans);
        println!("IMU samples: {}", map.imu_samples);
        println!("Odometer samples: {}", map.odometer_samples);
        println!("Point cloud: {} bytes", map.point_cloud_bytes);
        println!("Throughput: {:.2} readings/s", self.throughput());
        if let Some(time) = map.last_reading_time {
            println!("Last reading: {time}");
        }
        if let Some(position) = &map.latest_position {
            println!(
                "Position: lat {:.6}, lon {:.6}",
                position.latitude, position.longitude
            );
        }
        println!("Optimized: {}", if map.optimized { "yes" } else { "no" });
        println!();
    }
}
