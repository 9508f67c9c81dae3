//! Transaction coordination: the coordinator, the per-thread state it
//! parks while a unit of work runs, and the typed operations available
//! inside one.

mod manager;
mod ops;
pub(crate) mod state;

pub use manager::TransactionCoordinator;
pub use state::Txn;
