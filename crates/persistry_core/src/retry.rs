//! Retry primitive.

use std::time::Duration;
use tracing::info;

/// Puts the current thread to sleep between retry attempts.
///
/// Split out as a trait so tests can retry instantly.
pub trait Sleeper: Send + Sync {
    /// Sleeps for the given duration.
    fn sleep(&self, duration: Duration);
}

/// A [`Sleeper`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs a unit of work until it succeeds or a fixed attempt budget is
/// exhausted.
///
/// A caller-supplied predicate classifies each error as retriable or not;
/// a non-retriable error, or the last attempt's error, is returned
/// unchanged. The delay between attempts doubles from a base value.
pub struct Retrier {
    max_attempts: u32,
    base_delay: Duration,
    sleeper: Box<dyn Sleeper>,
}

impl Retrier {
    /// Default delay before the first retry.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

    /// Creates a retrier with the given attempt budget.
    ///
    /// A budget of 0 is treated as 1: the work always runs at least once.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self::with_sleeper(max_attempts, Self::DEFAULT_BASE_DELAY, Box::new(ThreadSleeper))
    }

    /// Creates a retrier with an explicit base delay and sleeper.
    #[must_use]
    pub fn with_sleeper(max_attempts: u32, base_delay: Duration, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            sleeper,
        }
    }

    /// Returns the attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calls `work` until it returns `Ok`, an error the predicate rejects,
    /// or the budget runs out.
    pub fn call_with_retry<T, E, W, P>(&self, mut work: W, is_retriable: P) -> Result<T, E>
    where
        E: std::fmt::Display,
        W: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let mut delay = self.base_delay;
        for attempt in 1..=self.max_attempts {
            match work() {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && is_retriable(&error) => {
                    info!(attempt, error = %error, "transient failure; retrying unit of work");
                    self.sleeper.sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(error) => return Err(error),
            }
        }
        unreachable!("retry loop always returns within the attempt budget")
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}
