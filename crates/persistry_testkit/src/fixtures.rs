//! Test fixtures: sample entities and a ready-made coordinator.

use crate::clock::FakeClock;
use crate::sleep::NoSleep;
use persistry_core::entity::{row_bool, row_i64, row_text};
use persistry_core::retry::Retrier;
use persistry_core::{CoordinatorConfig, Entity, PersistResult, TransactionCoordinator};
use persistry_store::{MemStore, Row, Store, Value};
use std::sync::Arc;
use std::time::Duration;

/// A registrar record with a single integer key.
#[derive(Debug, Clone, PartialEq)]
pub struct Registrar {
    /// Primary key.
    pub registrar_id: i64,
    /// Display name.
    pub name: String,
    /// Whether the registrar may currently register names.
    pub active: bool,
}

impl Registrar {
    /// Creates an active registrar.
    #[must_use]
    pub fn new(registrar_id: i64, name: impl Into<String>) -> Self {
        Self {
            registrar_id,
            name: name.into(),
            active: true,
        }
    }
}

impl Entity for Registrar {
    const TABLE: &'static str = "registrar";
    const ID_COLUMNS: &'static [&'static str] = &["registrar_id"];

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("registrar_id".into(), Value::Int(self.registrar_id));
        row.insert("name".into(), Value::Text(self.name.clone()));
        row.insert("active".into(), Value::Bool(self.active));
        row
    }

    fn from_row(row: &Row) -> PersistResult<Self> {
        Ok(Self {
            registrar_id: row_i64(row, "registrar_id")?,
            name: row_text(row, "name")?,
            active: row_bool(row, "active")?,
        })
    }
}

/// A reserved label record with a composite (label, tld) key.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedLabel {
    /// Reserved label, e.g. `"example"`.
    pub label: String,
    /// Top-level domain the reservation applies to.
    pub tld: String,
    /// Human-readable reason for the reservation.
    pub reason: String,
}

impl ReservedLabel {
    /// Creates a reservation.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        tld: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            tld: tld.into(),
            reason: reason.into(),
        }
    }
}

impl Entity for ReservedLabel {
    const TABLE: &'static str = "reserved_label";
    const ID_COLUMNS: &'static [&'static str] = &["label", "tld"];

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("label".into(), Value::Text(self.label.clone()));
        row.insert("tld".into(), Value::Text(self.tld.clone()));
        row.insert("reason".into(), Value::Text(self.reason.clone()));
        row
    }

    fn from_row(row: &Row) -> PersistResult<Self> {
        Ok(Self {
            label: row_text(row, "label")?,
            tld: row_text(row, "tld")?,
            reason: row_text(row, "reason")?,
        })
    }
}

/// A coordinator wired to an in-memory store, a settable clock, and a
/// non-sleeping retrier.
pub struct TestEnv {
    /// The backing store; inspect it to see committed state.
    pub store: MemStore,
    /// The clock the coordinator stamps transaction times from.
    pub clock: Arc<FakeClock>,
    /// The coordinator under test.
    pub tm: TransactionCoordinator,
}

impl TestEnv {
    /// Creates an environment with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Creates an environment with the given configuration.
    #[must_use]
    pub fn with_config(config: CoordinatorConfig) -> Self {
        let store = MemStore::new();
        Self::over_store(store.clone(), Arc::new(store), config)
    }

    /// Creates an environment over an arbitrary store, keeping a handle
    /// on the in-memory tables for inspection.
    #[must_use]
    pub fn over_store(
        tables: MemStore,
        store: Arc<dyn Store>,
        config: CoordinatorConfig,
    ) -> Self {
        let clock = Arc::new(FakeClock::new());
        let retrier = Retrier::with_sleeper(
            config.max_attempts,
            Duration::from_millis(1),
            Box::new(NoSleep),
        );
        let tm = TransactionCoordinator::with_parts(store, config, clock.clone(), retrier);
        Self {
            store: tables,
            clock,
            tm,
        }
    }

    /// Creates an environment whose coordinator runs against a read-only
    /// replica of this environment's store.
    #[must_use]
    pub fn replica(&self) -> Self {
        let replica = self.store.replica();
        Self::over_store(
            replica.clone(),
            Arc::new(replica),
            CoordinatorConfig::default(),
        )
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a tracing subscriber reading `RUST_LOG`. Safe to call from
/// every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
