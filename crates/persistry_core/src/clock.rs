//! Time source abstraction.

use std::time::SystemTime;

/// Source of the current time.
///
/// The coordinator reads the clock exactly once per unit of work, at
/// transaction start; every "now" inside the unit of work observes that
/// same value. Tests substitute a settable implementation.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Wall-clock implementation backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
