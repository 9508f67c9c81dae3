//! Error types for store implementations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a store or one of its sessions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store detected a serialization conflict between concurrent
    /// transactions. Transient: safe to retry the whole unit of work.
    #[error("serialization conflict: {message}")]
    SerializationConflict {
        /// Description of the conflict.
        message: String,
    },

    /// A lock wait timed out. Transient: safe to retry the whole unit of
    /// work.
    #[error("lock wait timeout: {message}")]
    LockTimeout {
        /// Description of the timeout.
        message: String,
    },

    /// A record with the same identity already exists.
    #[error("duplicate key in {table}: {identity}")]
    DuplicateKey {
        /// The table that rejected the insert.
        table: String,
        /// Display form of the conflicting identity.
        identity: String,
    },

    /// A store constraint rejected the operation.
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violation.
        message: String,
    },

    /// A write operation was attempted on a read-only session.
    #[error("store is read-only: {operation} is a write operation")]
    ReadOnly {
        /// The operation that was rejected.
        operation: String,
    },

    /// The session was used outside its begin/commit lifecycle.
    #[error("invalid session state: {message}")]
    InvalidState {
        /// Description of the misuse.
        message: String,
    },

    /// The connection to the store failed.
    #[error("connection failure: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates a serialization conflict error.
    pub fn serialization_conflict(message: impl Into<String>) -> Self {
        Self::SerializationConflict {
            message: message.into(),
        }
    }

    /// Creates a lock wait timeout error.
    pub fn lock_timeout(message: impl Into<String>) -> Self {
        Self::LockTimeout {
            message: message.into(),
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates a read-only rejection for the named operation.
    pub fn read_only(operation: impl Into<String>) -> Self {
        Self::ReadOnly {
            operation: operation.into(),
        }
    }

    /// Creates an invalid session state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a connection failure error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Returns true for the transient-conflict classes that a coordinator
    /// may retry: serialization conflicts and lock-wait timeouts.
    ///
    /// Everything else (duplicate keys, constraint violations, connectivity
    /// failures, session misuse) must surface to the caller unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SerializationConflict { .. } | Self::LockTimeout { .. }
        )
    }
}
