//! Injectable time source.
//!
//! Every timestamp read in the breaker, retry manager, and governance chain
//! goes through a [`Clock`] rather than calling `SystemTime::now()`
//! directly, so that scenarios like spec.md S5 (breaker trip-and-recover)
//! and S6 (full session lifecycle) are reproducible in tests without real
//! sleeps.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of the current time, abstracted so tests can control it.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Current time as a UTC `DateTime`, for ISO-8601 formatting.
    fn now_utc(&self) -> DateTime<Utc> {
        let millis = self.now_millis();
        DateTime::from_timestamp_millis(millis as i64).unwrap_or_else(Utc::now)
    }
}

/// Default clock backed by the OS wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis() as u64
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// when explicitly advanced.
#[derive(Clone)]
pub struct FixedClock {
    millis: Arc<Mutex<u64>>,
}

impl FixedClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: Arc::new(Mutex::new(start_millis)),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.millis.lock();
        *guard += delta.as_millis() as u64;
    }

    pub fn set(&self, millis: u64) {
        *self.millis.lock() = millis;
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        *self.millis.lock()
    }
}

/// Shared, dynamically dispatched clock handle used throughout the core.
pub type SharedClock = Arc<dyn Clock>;

/// Convenience constructor for the default wall-clock `SharedClock`.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_only_advances_when_told() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now_millis(), 1_500);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now_millis();
        std::thread::sleep(Duration::from_millis(5));
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
