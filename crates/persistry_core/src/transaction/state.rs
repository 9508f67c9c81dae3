//! Per-thread transaction state.
//!
//! An open transaction is a [`SessionGuard`] parked in a thread-local
//! slot for the duration of the work closure. The closure itself receives
//! a [`Txn`] handle onto the same guard, so ordinary code never touches
//! the slot; the slot exists so the coordinator can detect a nested
//! `transact` call on the same thread and, when configured to tolerate
//! one, let it join the outer transaction.

use crate::allocator::IdAllocator;
use crate::error::{PersistError, PersistResult};
use persistry_store::{Identity, Isolation, StoreSession};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::SystemTime;

/// Identity of one write issued in the open transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PendingKey {
    pub(crate) table: String,
    pub(crate) identity: Identity,
}

/// Everything owned by one open transaction.
pub(crate) struct SessionGuard {
    pub(crate) session: Box<dyn StoreSession>,
    pub(crate) transaction_time: SystemTime,
    pub(crate) allocator: IdAllocator,
    pub(crate) read_only: bool,
    pub(crate) pending: HashSet<PendingKey>,
}

impl SessionGuard {
    pub(crate) fn new(
        session: Box<dyn StoreSession>,
        transaction_time: SystemTime,
        allocator: IdAllocator,
        read_only: bool,
    ) -> Self {
        Self {
            session,
            transaction_time,
            allocator,
            read_only,
            pending: HashSet::new(),
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Rc<RefCell<SessionGuard>>>> = const { RefCell::new(None) };
}

/// Clears the thread-local slot when dropped, on both the commit path
/// and unwinding out of the work closure.
pub(crate) struct SlotGuard {
    _priv: (),
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        ACTIVE.with(|slot| *slot.borrow_mut() = None);
    }
}

/// Parks a fresh guard in the thread-local slot.
pub(crate) fn install(guard: SessionGuard) -> (Rc<RefCell<SessionGuard>>, SlotGuard) {
    let shared = Rc::new(RefCell::new(guard));
    ACTIVE.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&shared)));
    (shared, SlotGuard { _priv: () })
}

/// Returns the guard of the transaction open on this thread, if any.
pub(crate) fn current() -> Option<Rc<RefCell<SessionGuard>>> {
    ACTIVE.with(|slot| slot.borrow().clone())
}

/// True when a transaction is open on this thread.
pub(crate) fn in_transaction() -> bool {
    ACTIVE.with(|slot| slot.borrow().is_some())
}

/// Handle onto the open transaction, passed to every work closure.
///
/// All persistence operations go through this handle. It is deliberately
/// not `Send`: a transaction belongs to the thread that opened it.
pub struct Txn {
    inner: Rc<RefCell<SessionGuard>>,
}

impl Txn {
    pub(crate) fn from_guard(inner: Rc<RefCell<SessionGuard>>) -> Self {
        Self { inner }
    }

    /// The time the transaction was opened. Fixed for the whole
    /// transaction so that every statement sees the same clock reading.
    #[must_use]
    pub fn transaction_time(&self) -> SystemTime {
        self.inner.borrow().transaction_time
    }

    /// The effective isolation level of the open transaction.
    #[must_use]
    pub fn isolation(&self) -> Isolation {
        self.inner.borrow().session.isolation()
    }

    /// True when the transaction cannot issue writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.borrow().read_only
    }

    /// Allocates a fresh entity identifier.
    pub fn allocate_id(&self) -> PersistResult<i64> {
        let mut guard = self.inner.borrow_mut();
        let allocator = guard.allocator;
        allocator.allocate(guard.session.as_mut())
    }

    /// Runs a closure against the underlying store session.
    ///
    /// Escape hatch for reads the typed operations cannot express. The
    /// closure must not call back into other methods of this handle.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut dyn StoreSession) -> PersistResult<T>,
    ) -> PersistResult<T> {
        let mut guard = self.inner.borrow_mut();
        f(guard.session.as_mut())
    }

    pub(crate) fn ensure_writable(&self) -> PersistResult<()> {
        if self.inner.borrow().read_only {
            return Err(PersistError::Store(persistry_store::StoreError::read_only(
                "write through transaction handle",
            )));
        }
        Ok(())
    }

    pub(crate) fn note_pending(&self, table: &str, identity: Identity) {
        self.inner.borrow_mut().pending.insert(PendingKey {
            table: table.to_owned(),
            identity,
        });
    }

    pub(crate) fn is_pending(&self, table: &str, identity: &Identity) -> bool {
        let guard = self.inner.borrow();
        guard
            .pending
            .contains(&PendingKey {
                table: table.to_owned(),
                identity: identity.clone(),
            })
    }

}
