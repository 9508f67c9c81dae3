//! Fault injection for exercising retry and rollback paths.

use persistry_store::{
    Identity, Isolation, MemStore, Predicate, Row, Select, Store, StoreError, StoreResult,
    StoreSession, TxnOptions,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FaultState {
    fail_commits: AtomicU32,
    fail_rollbacks: AtomicU32,
    sessions_opened: AtomicU64,
}

/// A store wrapper that injects failures at commit and rollback.
///
/// Commit failures surface as serialization conflicts, the retriable
/// kind, so tests can drive the coordinator's retry loop without a
/// contended real store.
#[derive(Clone)]
pub struct FaultStore {
    inner: MemStore,
    state: Arc<FaultState>,
}

impl FaultStore {
    /// Wraps an in-memory store with no faults armed.
    #[must_use]
    pub fn new(inner: MemStore) -> Self {
        Self {
            inner,
            state: Arc::new(FaultState::default()),
        }
    }

    /// Arms the next `n` commits to fail with a serialization conflict.
    pub fn fail_next_commits(&self, n: u32) {
        self.state.fail_commits.store(n, Ordering::SeqCst);
    }

    /// Arms the next `n` rollbacks to fail with a connection error.
    pub fn fail_next_rollbacks(&self, n: u32) {
        self.state.fail_rollbacks.store(n, Ordering::SeqCst);
    }

    /// Number of sessions opened so far; one per transaction attempt.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// The wrapped store, for inspecting committed state.
    #[must_use]
    pub fn inner(&self) -> &MemStore {
        &self.inner
    }
}

impl Store for FaultStore {
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        let session = self.inner.open_session()?;
        Ok(Box::new(FaultSession {
            inner: session,
            state: Arc::clone(&self.state),
        }))
    }

    fn default_isolation(&self) -> Isolation {
        self.inner.default_isolation()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }
}

struct FaultSession {
    inner: Box<dyn StoreSession>,
    state: Arc<FaultState>,
}

impl FaultSession {
    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl StoreSession for FaultSession {
    fn begin(&mut self, options: &TxnOptions) -> StoreResult<()> {
        self.inner.begin(options)
    }

    fn commit(&mut self) -> StoreResult<()> {
        if Self::take_fault(&self.state.fail_commits) {
            // The session is left open; the coordinator's error path
            // rolls it back like any other failed commit.
            return Err(StoreError::serialization_conflict(
                "injected commit conflict",
            ));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if Self::take_fault(&self.state.fail_rollbacks) {
            return Err(StoreError::connection("injected rollback failure"));
        }
        self.inner.rollback()
    }

    fn isolation(&self) -> Isolation {
        self.inner.isolation()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn find(&mut self, table: &str, identity: &Identity) -> StoreResult<Option<Row>> {
        self.inner.find(table, identity)
    }

    fn persist(&mut self, table: &str, identity: &Identity, row: Row) -> StoreResult<()> {
        self.inner.persist(table, identity, row)
    }

    fn merge(&mut self, table: &str, identity: &Identity, row: Row) -> StoreResult<()> {
        self.inner.merge(table, identity, row)
    }

    fn remove(&mut self, table: &str, identity: &Identity) -> StoreResult<u64> {
        self.inner.remove(table, identity)
    }

    fn select(&mut self, query: &Select) -> StoreResult<Vec<Row>> {
        self.inner.select(query)
    }

    fn count(&mut self, table: &str, predicates: &[Predicate]) -> StoreResult<u64> {
        self.inner.count(table, predicates)
    }

    fn next_sequence_value(&mut self) -> StoreResult<i64> {
        self.inner.next_sequence_value()
    }
}
