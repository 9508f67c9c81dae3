//! # persistry store
//!
//! The relational-access capability the persistry transaction coordinator
//! is layered on.
//!
//! This crate defines the boundary, not the coordinator: a store can
//! find-by-identity, persist, merge, remove, run filtered selects, fetch
//! sequence values, and begin/commit/rollback. The coordinator in
//! `persistry_core` owns everything above that line (retry, identity
//! resolution, detachment, query composition).
//!
//! ## Provided implementation
//!
//! - [`MemStore`] — an in-memory transactional store for tests and
//!   ephemeral use, with read-only replica handles.
//!
//! ## Example
//!
//! ```rust
//! use persistry_store::{Identity, MemStore, Row, Store, TxnOptions, Value};
//!
//! let store = MemStore::new();
//! let mut session = store.open_session().unwrap();
//! session.begin(&TxnOptions::default()).unwrap();
//!
//! let identity = Identity::single("id", Value::Int(1));
//! let mut row = Row::new();
//! row.insert("id".into(), Value::Int(1));
//! session.persist("registrar", &identity, row).unwrap();
//! session.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod identity;
mod mem;
mod session;
mod value;

pub use error::{StoreError, StoreResult};
pub use identity::Identity;
pub use mem::{MemSession, MemStore};
pub use session::{CompareOp, Isolation, Predicate, Select, Store, StoreSession, TxnOptions};
pub use value::{Row, Value};
