//! Rate controller
//!
//! An online loop polls at a nominal cadence. After each submission it sleeps whatever
//! is left of the interval; an over-long submission yields zero sleep, never a
//! skipped poll.

use std::time::Duration;

/// Nominal poll interval for a data rate (`1000 / hz` ms)
///
/// Returns zero for a rate that is not a positive finite number, and saturates at
/// [`Duration::MAX`] for rates too slow to represent.
pub fn nominal_interval(data_frequency_hz: f64) -> Duration {
    if data_frequency_hz.is_finite() && data_frequency_hz > 0.0 {
        Duration::try_from_secs_f64(1.0 / data_frequency_hz)
            .unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Remaining sleep: `max(0, nominal - elapsed)`
pub fn time_to_sleep(nominal: Duration, elapsed: Duration) -> Duration {
    nominal.saturating_sub(elapsed)
}

/// Per-stream cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateController {
    interval: Duration,
}

impl RateController {
    pub fn from_frequency(data_frequency_hz: f64) -> Self {
        Self {
            interval: nominal_interval(data_frequency_hz),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep owed after a submission that took `elapsed`
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        time_to_sleep(self.interval, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_nominal_interval() {
        assert_eq!(nominal_interval(10.0), Duration::from_millis(100));
        assert_eq!(nominal_interval(1000.0), Duration::from_millis(1));
        assert_eq!(nominal_interval(0.0), Duration::ZERO);
        assert_eq!(nominal_interval(-5.0), Duration::ZERO);
        assert_eq!(nominal_interval(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_nominal_interval_saturates_for_tiny_rates() {
        assert_eq!(nominal_interval(1e-20), Duration::MAX);
        assert_eq!(nominal_interval(1e-310), Duration::MAX);
        assert_eq!(nominal_interval(0.001), Duration::from_secs(1000));

        let rate = RateController::from_frequency(1e-20);
        assert_eq!(
            rate.remaining(Duration::from_secs(5)),
            Duration::MAX - Duration::from_secs(5)
        );
    }

    #[test]
    fn test_time_to_sleep_is_remainder() {
        let nominal = Duration::from_millis(100);
        assert_eq!(
            time_to_sleep(nominal, Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(time_to_sleep(nominal, Duration::ZERO), nominal);
    }

    #[test]
    fn test_time_to_sleep_zero_when_over_budget() {
        let nominal = Duration::from_millis(100);
        assert_eq!(time_to_sleep(nominal, nominal), Duration::ZERO);
        assert_eq!(
            time_to_sleep(nominal, Duration::from_secs(3)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_time_to_sleep_never_exceeds_nominal() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let nominal = Duration::from_micros(rng.random_range(0..200_000));
            let elapsed = Duration::from_micros(rng.random_range(0..400_000));
            let sleep = time_to_sleep(nominal, elapsed);
            assert!(sleep <= nominal);
            if elapsed >= nominal {
                assert_eq!(sleep, Duration::ZERO);
            } else {
                assert_eq!(sleep + elapsed, nominal);
            }
        }
    }

    #[test]
    fn test_rate_controller() {
        let rate = RateController::from_frequency(20.0);
        assert_eq!(rate.interval(), Duration::from_millis(50));
        assert_eq!(
            rate.remaining(Duration::from_millis(20)),
            Duration::from_millis(30)
        );
    }
}
