//! Sleepers for retry tests.

use parking_lot::Mutex;
use persistry_core::retry::Sleeper;
use std::time::Duration;

/// A sleeper that returns immediately, so retry tests run at full speed.
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// A sleeper that records every requested delay instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Creates an empty recording sleeper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The delays requested so far, in order.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

/// A boxable handle onto a shared [`RecordingSleeper`], so a test can
/// keep the recorder while the retrier owns the sleeper.
pub struct SharedSleeper(pub std::sync::Arc<RecordingSleeper>);

impl Sleeper for SharedSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.sleep(duration);
    }
}
