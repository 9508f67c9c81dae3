//! Identifier allocation strategies.
//!
//! Writable deployments draw ids from the store's shared sequence so
//! every process sees the same counter. Replica deployments cannot write
//! to the store at all, so they fall back to a process-local counter
//! that is unique and strictly increasing within the process only. That
//! is sufficient for replica workloads, which never persist the ids.

use crate::error::PersistResult;
use persistry_store::StoreSession;
use std::sync::atomic::{AtomicI64, Ordering};

static LOCAL_COUNTER: AtomicI64 = AtomicI64::new(0);

/// Source of fresh entity identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAllocator {
    /// Draws from the store's shared sequence.
    Sequence,
    /// Draws from a process-local counter starting at 1. Used on
    /// read-only replicas where the sequence cannot be advanced.
    ReplicaLocal,
}

impl IdAllocator {
    /// Allocates the next identifier.
    pub fn allocate(&self, session: &mut dyn StoreSession) -> PersistResult<i64> {
        match self {
            IdAllocator::Sequence => Ok(session.next_sequence_value()?),
            IdAllocator::ReplicaLocal => Ok(LOCAL_COUNTER.fetch_add(1, Ordering::Relaxed) + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistry_store::{MemStore, Store, TxnOptions};

    #[test]
    fn sequence_ids_come_from_the_store() {
        let store = MemStore::new();
        let mut a = store.open_session().unwrap();
        let mut b = store.open_session().unwrap();
        a.begin(&TxnOptions::default()).unwrap();
        b.begin(&TxnOptions::default()).unwrap();

        let first = IdAllocator::Sequence.allocate(a.as_mut()).unwrap();
        let second = IdAllocator::Sequence.allocate(b.as_mut()).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn replica_ids_are_positive_and_increasing() {
        let store = MemStore::new().replica();
        let mut session = store.open_session().unwrap();
        session
            .begin(&TxnOptions {
                read_only: true,
                isolation: None,
            })
            .unwrap();

        let first = IdAllocator::ReplicaLocal.allocate(session.as_mut()).unwrap();
        let second = IdAllocator::ReplicaLocal.allocate(session.as_mut()).unwrap();
        assert!(first >= 1);
        assert!(second > first);
    }
}
