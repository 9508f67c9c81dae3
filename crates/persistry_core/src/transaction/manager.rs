//! The transaction coordinator.

use crate::allocator::IdAllocator;
use crate::clock::{Clock, SystemClock};
use crate::config::CoordinatorConfig;
use crate::error::{PersistError, PersistResult};
use crate::retry::{Retrier, ThreadSleeper};
use crate::transaction::state::{self, SessionGuard, Txn};
use persistry_store::{Isolation, Store, TxnOptions};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs units of work as transactions against a [`Store`].
///
/// One coordinator is shared across threads; each `transact` call opens
/// its own session, runs the work closure with a [`Txn`] handle, and
/// commits on success or rolls back on error. A retriable failure reruns
/// the whole closure in a fresh transaction, so work closures must be
/// written to tolerate re-execution.
pub struct TransactionCoordinator {
    store: Arc<dyn Store>,
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    retrier: Retrier,
    allocator: IdAllocator,
}

impl TransactionCoordinator {
    /// Creates a coordinator with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    /// Creates a coordinator with the given configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn Store>, config: CoordinatorConfig) -> Self {
        let retrier = Retrier::with_sleeper(
            config.max_attempts,
            config.retry_base_delay,
            Box::new(ThreadSleeper),
        );
        Self::with_parts(store, config, Arc::new(SystemClock), retrier)
    }

    /// Creates a coordinator with an explicit clock and retrier. Used by
    /// tests that need deterministic time and no real sleeping.
    #[must_use]
    pub fn with_parts(
        store: Arc<dyn Store>,
        config: CoordinatorConfig,
        clock: Arc<dyn Clock>,
        retrier: Retrier,
    ) -> Self {
        // Sequence fetches are writes; any read-only connection, whether
        // a replica or a read-only coordinator over a primary, has to
        // draw ids from the process-local counter instead.
        let allocator = if config.read_only || !store.is_writable() {
            IdAllocator::ReplicaLocal
        } else {
            IdAllocator::Sequence
        };
        Self {
            store,
            config,
            clock,
            retrier,
            allocator,
        }
    }

    /// True when a transaction is open on the calling thread.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        state::in_transaction()
    }

    /// Fails with [`PersistError::NotInTransaction`] when no transaction
    /// is open on the calling thread.
    pub fn assert_in_transaction(&self) -> PersistResult<()> {
        if state::in_transaction() {
            Ok(())
        } else {
            Err(PersistError::NotInTransaction)
        }
    }

    /// The store's configured default isolation level.
    #[must_use]
    pub fn default_isolation(&self) -> Isolation {
        self.store.default_isolation()
    }

    /// Runs the work closure in a transaction at the store's default
    /// isolation, retrying on transient store failures.
    pub fn transact<T>(
        &self,
        mut work: impl FnMut(&Txn) -> PersistResult<T>,
    ) -> PersistResult<T> {
        self.retry(None, &mut work)
    }

    /// Runs the work closure in a transaction at the given isolation,
    /// retrying on transient store failures.
    pub fn transact_with<T>(
        &self,
        isolation: Isolation,
        mut work: impl FnMut(&Txn) -> PersistResult<T>,
    ) -> PersistResult<T> {
        self.retry(Some(isolation), &mut work)
    }

    /// Runs the work closure in a single transaction attempt, without
    /// retrying. For work with side effects that must not re-execute.
    pub fn transact_no_retry<T>(
        &self,
        isolation: Option<Isolation>,
        work: impl FnOnce(&Txn) -> PersistResult<T>,
    ) -> PersistResult<T> {
        self.attempt(isolation, work)
    }

    /// Joins the transaction already open on this thread, or runs the
    /// closure in a fresh retried transaction when none is open. For call
    /// sites that legitimately run both inside and outside transactions.
    pub fn re_transact<T>(
        &self,
        mut work: impl FnMut(&Txn) -> PersistResult<T>,
    ) -> PersistResult<T> {
        if let Some(outer) = state::current() {
            let txn = Txn::from_guard(outer);
            return work(&txn);
        }
        self.retry(None, &mut work)
    }

    fn retry<T>(
        &self,
        isolation: Option<Isolation>,
        work: &mut impl FnMut(&Txn) -> PersistResult<T>,
    ) -> PersistResult<T> {
        // A nested call joins the outer transaction and is never retried
        // on its own; only the outermost transact owns the retry loop.
        if state::in_transaction() {
            return self.attempt(isolation, &mut *work);
        }
        self.retrier
            .call_with_retry(|| self.attempt(isolation, &mut *work), PersistError::is_retriable)
    }

    fn attempt<T>(
        &self,
        isolation: Option<Isolation>,
        work: impl FnOnce(&Txn) -> PersistResult<T>,
    ) -> PersistResult<T> {
        if let Some(outer) = state::current() {
            if !self.config.allow_nested_transactions {
                return Err(PersistError::NestedTransaction);
            }
            if isolation.is_some() {
                return Err(PersistError::NestedIsolationOverride);
            }
            let txn = Txn::from_guard(outer);
            return work(&txn);
        }

        let read_only = self.config.read_only || !self.store.is_writable();
        if read_only {
            info!("opening read-only transaction");
        }
        // Overriding with the default would cost a round trip for nothing.
        let isolation = isolation.filter(|level| *level != self.store.default_isolation());
        if let Some(level) = isolation {
            info!(%level, "overriding transaction isolation level");
        }

        let mut session = self.store.open_session()?;
        session.begin(&TxnOptions {
            read_only,
            isolation,
        })?;
        let guard = SessionGuard::new(session, self.clock.now(), self.allocator, read_only);
        let (shared, slot) = state::install(guard);

        let txn = Txn::from_guard(Rc::clone(&shared));
        let result = work(&txn);
        drop(txn);
        drop(slot);

        let result = result.and_then(|value| {
            shared.borrow_mut().session.commit()?;
            Ok(value)
        });
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, "transaction failed, rolling back");
                if let Err(rollback_err) = shared.borrow_mut().session.rollback() {
                    // The original failure is the interesting one; a
                    // rollback error on top of it is only logged.
                    error!(error = %rollback_err, "rollback failed, suppressing");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Sleeper;
    use persistry_store::{MemStore, Select, StoreError, Value};
    use std::time::Duration;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    fn coordinator(store: MemStore, config: CoordinatorConfig) -> TransactionCoordinator {
        let retrier = Retrier::with_sleeper(
            config.max_attempts,
            Duration::from_millis(1),
            Box::new(NoSleep),
        );
        TransactionCoordinator::with_parts(
            Arc::new(store),
            config,
            Arc::new(SystemClock),
            retrier,
        )
    }

    #[test]
    fn commit_publishes_writes() {
        let store = MemStore::new();
        let committed = store.clone();
        let tm = coordinator(store, CoordinatorConfig::default());

        tm.transact(|txn| {
            txn.with_session(|session| {
                let identity = persistry_store::Identity::single("id", Value::Int(1));
                let mut row = persistry_store::Row::new();
                row.insert("id".into(), Value::Int(1));
                session.persist("widget", &identity, row)?;
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(committed.committed_rows("widget"), 1);
    }

    #[test]
    fn error_rolls_back() {
        let store = MemStore::new();
        let committed = store.clone();
        let tm = coordinator(store, CoordinatorConfig::default());

        let result: PersistResult<()> = tm.transact(|txn| {
            txn.with_session(|session| {
                let identity = persistry_store::Identity::single("id", Value::Int(1));
                let mut row = persistry_store::Row::new();
                row.insert("id".into(), Value::Int(1));
                session.persist("widget", &identity, row)?;
                Ok(())
            })?;
            Err(PersistError::invalid_argument("boom"))
        });

        assert!(matches!(result, Err(PersistError::InvalidArgument { .. })));
        assert_eq!(committed.committed_rows("widget"), 0);
    }

    #[test]
    fn nested_transact_is_rejected_by_default() {
        let store = MemStore::new();
        let tm = coordinator(store, CoordinatorConfig::default());

        let result: PersistResult<()> = tm.transact(|_| tm.transact(|_| Ok(())));
        assert!(matches!(result, Err(PersistError::NestedTransaction)));
    }

    #[test]
    fn nested_transact_joins_when_allowed() {
        let store = MemStore::new();
        let tm = coordinator(
            store,
            CoordinatorConfig::new().allow_nested_transactions(true),
        );

        let time = tm
            .transact(|outer| {
                let outer_time = outer.transaction_time();
                let inner_time = tm.transact(|inner| Ok(inner.transaction_time()))?;
                assert_eq!(outer_time, inner_time);
                Ok(outer_time)
            })
            .unwrap();
        assert!(time.elapsed().is_ok());
    }

    #[test]
    fn nested_isolation_override_is_rejected_even_when_nesting_allowed() {
        let store = MemStore::new();
        let tm = coordinator(
            store,
            CoordinatorConfig::new().allow_nested_transactions(true),
        );

        let result: PersistResult<()> = tm.transact(|_| {
            tm.transact_with(Isolation::Serializable, |_| Ok(()))
        });
        assert!(matches!(result, Err(PersistError::NestedIsolationOverride)));
    }

    #[test]
    fn re_transact_joins_or_opens() {
        let store = MemStore::new();
        let tm = coordinator(store, CoordinatorConfig::default());

        // Outside a transaction it opens one.
        tm.re_transact(|txn| {
            assert!(!txn.is_read_only());
            Ok(())
        })
        .unwrap();

        // Inside one it joins instead of failing.
        tm.transact(|outer| {
            let outer_time = outer.transaction_time();
            tm.re_transact(|inner| {
                assert_eq!(inner.transaction_time(), outer_time);
                Ok(())
            })
        })
        .unwrap();
    }

    #[test]
    fn transient_failures_are_retried() {
        let store = MemStore::new();
        let tm = coordinator(store, CoordinatorConfig::new().max_attempts(3));

        let mut calls = 0;
        let result = tm.transact(|_| {
            calls += 1;
            if calls < 3 {
                Err(PersistError::Store(StoreError::serialization_conflict(
                    "try again",
                )))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn non_transient_failures_are_not_retried() {
        let store = MemStore::new();
        let tm = coordinator(store, CoordinatorConfig::new().max_attempts(5));

        let mut calls = 0;
        let result: PersistResult<()> = tm.transact(|_| {
            calls += 1;
            Err(PersistError::invalid_argument("permanent"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn no_retry_runs_exactly_once() {
        let store = MemStore::new();
        let tm = coordinator(store, CoordinatorConfig::new().max_attempts(5));

        let result: PersistResult<()> = tm.transact_no_retry(None, |_| {
            Err(PersistError::Store(StoreError::serialization_conflict(
                "transient",
            )))
        });
        assert!(result.is_err());
    }

    #[test]
    fn replica_transactions_are_read_only() {
        let store = MemStore::new().replica();
        let tm = coordinator(store, CoordinatorConfig::default());

        tm.transact(|txn| {
            assert!(txn.is_read_only());
            txn.with_session(|session| {
                let rows = session.select(&Select::new("widget"))?;
                assert!(rows.is_empty());
                Ok(())
            })
        })
        .unwrap();
    }

    #[test]
    fn read_only_coordinator_over_a_primary_allocates_local_ids() {
        let store = MemStore::new();
        let committed = store.clone();
        let tm = coordinator(store, CoordinatorConfig::new().read_only(true));

        let (first, second) = tm
            .transact(|txn| {
                assert!(txn.is_read_only());
                Ok((txn.allocate_id()?, txn.allocate_id()?))
            })
            .unwrap();
        assert!(first >= 1);
        assert!(second > first);

        // The shared sequence must not have moved; a writable coordinator
        // over the same store still starts at 1.
        let writable = coordinator(committed, CoordinatorConfig::default());
        let from_sequence = writable.transact(|txn| txn.allocate_id()).unwrap();
        assert_eq!(from_sequence, 1);
    }

    #[test]
    fn assert_in_transaction_checks_the_thread() {
        let store = MemStore::new();
        let tm = coordinator(store, CoordinatorConfig::default());

        assert!(matches!(
            tm.assert_in_transaction(),
            Err(PersistError::NotInTransaction)
        ));
        tm.transact(|_| tm.assert_in_transaction()).unwrap();
        assert!(!tm.in_transaction());
    }
}
