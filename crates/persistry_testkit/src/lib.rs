//! # persistry testkit
//!
//! Test utilities for persistry.
//!
//! This crate provides:
//! - Sample entities with single and composite keys
//! - A ready-made coordinator over an in-memory store with a settable
//!   clock and a non-sleeping retrier
//! - Fault injection for commit and rollback paths
//!
//! ## Usage
//!
//! ```rust
//! use persistry_testkit::prelude::*;
//!
//! let env = TestEnv::new();
//! env.tm
//!     .transact(|txn| txn.insert(&Registrar::new(1, "acme")))
//!     .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod fault;
pub mod fixtures;
pub mod sleep;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clock::FakeClock;
    pub use crate::fault::FaultStore;
    pub use crate::fixtures::{init_tracing, Registrar, ReservedLabel, TestEnv};
    pub use crate::sleep::{NoSleep, RecordingSleeper, SharedSleeper};
}

pub use clock::FakeClock;
pub use fault::FaultStore;
pub use fixtures::{init_tracing, Registrar, ReservedLabel, TestEnv};
pub use sleep::{NoSleep, RecordingSleeper, SharedSleeper};
