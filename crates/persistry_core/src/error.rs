//! Error types for the transaction coordinator.

use persistry_store::StoreError;
use thiserror::Error;

/// Result type for coordinator operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors surfaced by the coordinator and unit-of-work operations.
///
/// Contract violations (nested calls, pending-write reloads, operating
/// outside a unit of work) are their own variants and are never retried;
/// only transient store conflicts are, see [`PersistError::is_retriable`].
#[derive(Debug, Error)]
pub enum PersistError {
    /// Underlying store error, preserved unchanged.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An operation that requires an active unit of work was invoked
    /// outside one.
    #[error("not in a transaction")]
    NotInTransaction,

    /// A transactional entry point was invoked while a unit of work was
    /// already active on this thread.
    #[error(
        "nested transaction detected; refactor to avoid nesting or use \
         re_transact() in call sites that may run nested"
    )]
    NestedTransaction,

    /// An isolation override was requested for a nested call, which would
    /// silently not apply to the already-open transaction.
    #[error("transaction isolation level cannot be specified for nested transactions")]
    NestedIsolationOverride,

    /// A record scheduled for write in this unit of work was read back.
    /// Detaching it would hand the caller stale pre-write state.
    #[error("inserted/updated record reloaded in {table}: {identity}")]
    ReloadedPendingWrite {
        /// Table of the reloaded record.
        table: String,
        /// Display form of its identity.
        identity: String,
    },

    /// No record found where one was required.
    #[error("no record found in {table} for {identity}")]
    NotFound {
        /// Table searched.
        table: String,
        /// Display form of the missing identity or key set.
        identity: String,
    },

    /// A query expected exactly one result and found another count.
    #[error("expected exactly one result for {table}, found {found}")]
    NonUniqueResult {
        /// Table queried.
        table: String,
        /// Number of matching rows (0 or at least 2).
        found: usize,
    },

    /// `update` was called for a record that does not exist in the store.
    #[error("given record does not exist in {table}: {identity}")]
    EntityDoesNotExist {
        /// Table of the record.
        table: String,
        /// Display form of its identity.
        identity: String,
    },

    /// `assert_delete` removed a row count other than one.
    #[error("expected to delete exactly one row in {table} for {identity}, removed {removed}")]
    DeleteFailed {
        /// Table targeted.
        table: String,
        /// Display form of the key.
        identity: String,
        /// Rows actually removed.
        removed: u64,
    },

    /// A caller-supplied argument violated the operation's contract.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violation.
        message: String,
    },
}

impl PersistError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true only for transient store conflicts.
    ///
    /// Contract violations and business errors are never retriable; a
    /// retry would just re-violate the contract. This is the predicate the
    /// coordinator hands to the [`Retrier`](crate::retry::Retrier).
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}
