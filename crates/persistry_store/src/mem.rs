//! In-memory store for tests and ephemeral use.

use crate::error::{StoreError, StoreResult};
use crate::identity::Identity;
use crate::session::{Isolation, Predicate, Select, Store, StoreSession, TxnOptions};
use crate::value::Row;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// An in-memory transactional store.
///
/// Sessions buffer their writes in a journal and publish them atomically
/// on commit, so a rolled-back or failed unit of work leaves the shared
/// tables untouched. Rows iterate in canonical identity-byte order, which
/// is the "store-determined order" selects fall back to.
///
/// Concurrency control is last-writer-wins; isolation between concurrent
/// sessions is out of scope for this reference store, as it is for the
/// coordinator layered on top of it.
///
/// # Replicas
///
/// [`MemStore::replica`] returns a read-only handle over the same shared
/// tables. Replica sessions reject every write, including sequence
/// fetches.
#[derive(Clone)]
pub struct MemStore {
    shared: Arc<Shared>,
    writable: bool,
    default_isolation: Isolation,
}

struct Shared {
    tables: RwLock<HashMap<String, BTreeMap<Vec<u8>, Row>>>,
    sequence: AtomicI64,
}

impl MemStore {
    /// Creates an empty, writable store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(HashMap::new()),
                sequence: AtomicI64::new(0),
            }),
            writable: true,
            default_isolation: Isolation::ReadCommitted,
        }
    }

    /// Sets the store's default isolation level.
    #[must_use]
    pub fn with_default_isolation(mut self, isolation: Isolation) -> Self {
        self.default_isolation = isolation;
        self
    }

    /// Returns a read-only handle over the same shared tables.
    #[must_use]
    pub fn replica(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            writable: false,
            default_isolation: self.default_isolation,
        }
    }

    /// Returns the number of committed rows in a table.
    ///
    /// Reads the shared state directly, outside any session. Useful for
    /// asserting on what actually got committed.
    #[must_use]
    pub fn committed_rows(&self, table: &str) -> usize {
        self.shared
            .tables
            .read()
            .get(table)
            .map_or(0, BTreeMap::len)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("writable", &self.writable)
            .field("default_isolation", &self.default_isolation)
            .finish_non_exhaustive()
    }
}

impl Store for MemStore {
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(MemSession {
            shared: Arc::clone(&self.shared),
            writable: self.writable,
            default_isolation: self.default_isolation,
            options: TxnOptions::default(),
            state: SessionState::Idle,
            journal: Vec::new(),
            overlay: HashMap::new(),
        }))
    }

    fn default_isolation(&self) -> Isolation {
        self.default_isolation
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Active,
    Closed,
}

enum WriteOp {
    Upsert { table: String, key: Vec<u8>, row: Row },
    Remove { table: String, key: Vec<u8> },
}

/// A session over a [`MemStore`].
pub struct MemSession {
    shared: Arc<Shared>,
    writable: bool,
    default_isolation: Isolation,
    options: TxnOptions,
    state: SessionState,
    journal: Vec<WriteOp>,
    // Read-your-writes view: key -> Some(row) for pending upserts,
    // None for pending removes.
    overlay: HashMap<(String, Vec<u8>), Option<Row>>,
}

impl MemSession {
    fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Idle => Err(StoreError::invalid_state("transaction not begun")),
            SessionState::Closed => Err(StoreError::invalid_state("session already closed")),
        }
    }

    fn ensure_writable(&self, operation: &str) -> StoreResult<()> {
        if !self.writable || self.options.read_only {
            return Err(StoreError::read_only(operation));
        }
        Ok(())
    }

    fn lookup(&self, table: &str, key: &[u8]) -> Option<Row> {
        if let Some(pending) = self.overlay.get(&(table.to_owned(), key.to_vec())) {
            return pending.clone();
        }
        self.shared
            .tables
            .read()
            .get(table)
            .and_then(|t| t.get(key))
            .cloned()
    }

    /// Committed rows for one table with this session's overlay applied,
    /// in canonical key order.
    fn merged_table(&self, table: &str) -> BTreeMap<Vec<u8>, Row> {
        let mut merged = self
            .shared
            .tables
            .read()
            .get(table)
            .cloned()
            .unwrap_or_default();
        for ((t, key), pending) in &self.overlay {
            if t != table {
                continue;
            }
            match pending {
                Some(row) => {
                    merged.insert(key.clone(), row.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
    }

    fn matching_rows(&self, table: &str, predicates: &[Predicate]) -> Vec<Row> {
        self.merged_table(table)
            .into_values()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .collect()
    }
}

impl StoreSession for MemSession {
    fn begin(&mut self, options: &TxnOptions) -> StoreResult<()> {
        if self.state != SessionState::Idle {
            return Err(StoreError::invalid_state("transaction already begun"));
        }
        if !options.read_only && !self.writable {
            return Err(StoreError::read_only("read-write transaction"));
        }
        self.options = *options;
        self.state = SessionState::Active;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        let mut tables = self.shared.tables.write();
        for op in self.journal.drain(..) {
            match op {
                WriteOp::Upsert { table, key, row } => {
                    tables.entry(table).or_default().insert(key, row);
                }
                WriteOp::Remove { table, key } => {
                    if let Some(t) = tables.get_mut(&table) {
                        t.remove(&key);
                    }
                }
            }
        }
        self.overlay.clear();
        self.state = SessionState::Closed;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        self.journal.clear();
        self.overlay.clear();
        self.state = SessionState::Closed;
        Ok(())
    }

    fn isolation(&self) -> Isolation {
        self.options.isolation.unwrap_or(self.default_isolation)
    }

    fn is_writable(&self) -> bool {
        self.writable && !self.options.read_only
    }

    fn find(&mut self, table: &str, identity: &Identity) -> StoreResult<Option<Row>> {
        self.ensure_active()?;
        Ok(self.lookup(table, &identity.key_bytes()))
    }

    fn persist(&mut self, table: &str, identity: &Identity, row: Row) -> StoreResult<()> {
        self.ensure_active()?;
        self.ensure_writable("persist")?;
        let key = identity.key_bytes();
        if self.lookup(table, &key).is_some() {
            return Err(StoreError::DuplicateKey {
                table: table.to_owned(),
                identity: identity.to_string(),
            });
        }
        self.overlay
            .insert((table.to_owned(), key.clone()), Some(row.clone()));
        self.journal.push(WriteOp::Upsert {
            table: table.to_owned(),
            key,
            row,
        });
        Ok(())
    }

    fn merge(&mut self, table: &str, identity: &Identity, row: Row) -> StoreResult<()> {
        self.ensure_active()?;
        self.ensure_writable("merge")?;
        let key = identity.key_bytes();
        self.overlay
            .insert((table.to_owned(), key.clone()), Some(row.clone()));
        self.journal.push(WriteOp::Upsert {
            table: table.to_owned(),
            key,
            row,
        });
        Ok(())
    }

    fn remove(&mut self, table: &str, identity: &Identity) -> StoreResult<u64> {
        self.ensure_active()?;
        self.ensure_writable("remove")?;
        let key = identity.key_bytes();
        if self.lookup(table, &key).is_none() {
            return Ok(0);
        }
        self.overlay.insert((table.to_owned(), key.clone()), None);
        self.journal.push(WriteOp::Remove {
            table: table.to_owned(),
            key,
        });
        Ok(1)
    }

    fn select(&mut self, query: &Select) -> StoreResult<Vec<Row>> {
        self.ensure_active()?;
        let mut rows = self.matching_rows(&query.table, &query.predicates);
        if let Some(column) = &query.order_by {
            rows.sort_by(|a, b| match (a.get(column), b.get(column)) {
                (Some(x), Some(y)) => x.compare(y).unwrap_or(std::cmp::Ordering::Equal),
                _ => std::cmp::Ordering::Equal,
            });
        }
        let rows = rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(rows)
    }

    fn count(&mut self, table: &str, predicates: &[Predicate]) -> StoreResult<u64> {
        self.ensure_active()?;
        Ok(self.matching_rows(table, predicates).len() as u64)
    }

    fn next_sequence_value(&mut self) -> StoreResult<i64> {
        self.ensure_active()?;
        self.ensure_writable("next_sequence_value")?;
        Ok(self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
