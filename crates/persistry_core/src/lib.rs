//! # persistry core
//!
//! A transactional persistence coordinator layered on the
//! [`persistry_store`] capability traits.
//!
//! This crate provides:
//! - A [`TransactionCoordinator`] that runs work closures as blocking
//!   transactions with commit/rollback and transparent retry of
//!   transient store conflicts
//! - A [`Txn`] handle with typed CRUD operations, batch loads, and a
//!   fluent [`QueryComposer`] with chunked result streaming
//! - Detached results: every load returns an owned copy, and reloading
//!   a record already written in the same transaction is an error
//! - Identifier allocation from the store sequence, with a
//!   process-local fallback on read-only replicas
//!
//! ## Example
//!
//! ```rust
//! use persistry_core::{Entity, Key, PersistResult, TransactionCoordinator};
//! use persistry_core::entity::{row_i64, row_text};
//! use persistry_store::{MemStore, Row, Value};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Registrar {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Registrar {
//!     const TABLE: &'static str = "registrar";
//!     const ID_COLUMNS: &'static [&'static str] = &["id"];
//!
//!     fn to_row(&self) -> Row {
//!         let mut row = Row::new();
//!         row.insert("id".into(), Value::Int(self.id));
//!         row.insert("name".into(), Value::Text(self.name.clone()));
//!         row
//!     }
//!
//!     fn from_row(row: &Row) -> PersistResult<Self> {
//!         Ok(Self {
//!             id: row_i64(row, "id")?,
//!             name: row_text(row, "name")?,
//!         })
//!     }
//! }
//!
//! let tm = TransactionCoordinator::new(Arc::new(MemStore::new()));
//! tm.transact(|txn| {
//!     txn.insert(&Registrar { id: 1, name: "acme".into() })
//! })
//! .unwrap();
//!
//! let loaded = tm
//!     .transact(|txn| txn.load_by_key::<Registrar>(&Key::int(1)))
//!     .unwrap();
//! assert_eq!(loaded.name, "acme");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod clock;
mod config;
mod detach;
pub mod entity;
mod error;
mod query;
pub mod retry;
mod transaction;

pub use allocator::IdAllocator;
pub use clock::{Clock, SystemClock};
pub use config::{CoordinatorConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY};
pub use entity::{Entity, Key};
pub use error::{PersistError, PersistResult};
pub use query::{QueryComposer, QueryStream, DEFAULT_FETCH_SIZE};
pub use transaction::{TransactionCoordinator, Txn};
