//! Coordinator configuration.

use std::time::Duration;

/// Default retry budget for retriable transaction failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Default initial backoff between retry attempts.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Tuning knobs for a [`TransactionCoordinator`](crate::TransactionCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Permits a `transact` call inside an open transaction to join the
    /// outer transaction instead of failing. Exists for gradual cleanup
    /// of legacy call paths; new code should not rely on it.
    pub allow_nested_transactions: bool,
    /// Forces every transaction opened by the coordinator to be read-only.
    pub read_only: bool,
    /// Total attempts (first try included) for retriable failures.
    pub max_attempts: u32,
    /// Initial backoff before the first retry. Doubles per attempt.
    pub retry_base_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            allow_nested_transactions: false,
            read_only: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl CoordinatorConfig {
    /// Returns the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether nested `transact` calls join the outer transaction.
    #[must_use]
    pub fn allow_nested_transactions(mut self, allow: bool) -> Self {
        self.allow_nested_transactions = allow;
        self
    }

    /// Marks every coordinated transaction as read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the total retry budget. Clamped to at least one attempt.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial retry backoff.
    #[must_use]
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }
}
