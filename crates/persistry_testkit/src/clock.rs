//! A settable clock for deterministic transaction times.

use parking_lot::Mutex;
use persistry_core::Clock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that only moves when told to.
pub struct FakeClock {
    now: Mutex<SystemTime>,
}

impl FakeClock {
    /// Creates a clock fixed at the given instant.
    #[must_use]
    pub fn at(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock fixed at a round test epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::at(UNIX_EPOCH + Duration::from_secs(1_600_000_000))
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, to: SystemTime) {
        *self.now.lock() = to;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_time() {
        let clock = FakeClock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), before + Duration::from_secs(60));
    }
}
