//! Store and session traits.
//!
//! This is the boundary the transaction coordinator is layered on: a
//! minimal relational-access capability with find-by-identity, persist,
//! merge, remove, filtered selects, and begin/commit/rollback. Concrete
//! stores implement these traits; the coordinator never sees anything
//! more specific.

use crate::error::StoreResult;
use crate::identity::Identity;
use crate::value::{Row, Value};
use std::fmt;

/// Transaction isolation level (best-effort across stores).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Statements see only data committed before they began.
    ReadCommitted,
    /// All statements see the snapshot taken at transaction start.
    RepeatableRead,
    /// Transactions behave as if executed serially.
    Serializable,
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::ReadCommitted => write!(f, "READ COMMITTED"),
            Isolation::RepeatableRead => write!(f, "REPEATABLE READ"),
            Isolation::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// Options applied when a session begins a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnOptions {
    /// Marks the transaction read-only; the session must reject writes.
    pub read_only: bool,
    /// Isolation override. `None` keeps the store's configured default;
    /// callers skip the override when it equals the default to avoid an
    /// extra round trip.
    pub isolation: Option<Isolation>,
}

/// Comparison operator for a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
}

/// A filter applied to a select or count.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Compares a column against a value. Rows whose column has a
    /// different value type do not match.
    Compare {
        /// Column name.
        column: String,
        /// Comparison operator.
        op: CompareOp,
        /// Value to compare against.
        value: Value,
    },
    /// Matches rows whose column value is one of the given values.
    In {
        /// Column name.
        column: String,
        /// Accepted values.
        values: Vec<Value>,
    },
}

impl Predicate {
    /// Builds an equality predicate.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    /// Evaluates the predicate against a row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Compare { column, op, value } => {
                let Some(actual) = row.get(column) else {
                    return false;
                };
                let Some(ordering) = actual.compare(value) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => ordering.is_eq(),
                    CompareOp::Ne => ordering.is_ne(),
                    CompareOp::Lt => ordering.is_lt(),
                    CompareOp::Lte => ordering.is_le(),
                    CompareOp::Gt => ordering.is_gt(),
                    CompareOp::Gte => ordering.is_ge(),
                }
            }
            Predicate::In { column, values } => row
                .get(column)
                .is_some_and(|actual| values.iter().any(|v| v == actual)),
        }
    }
}

/// A filtered, optionally ordered and bounded read over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Table to read.
    pub table: String,
    /// Filters; a row must match all of them.
    pub predicates: Vec<Predicate>,
    /// Optional single-column ascending sort. `None` leaves rows in the
    /// store-determined order.
    pub order_by: Option<String>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Number of matching rows to skip before returning any.
    pub offset: usize,
}

impl Select {
    /// Creates an unfiltered select over a table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicates: Vec::new(),
            order_by: None,
            limit: None,
            offset: 0,
        }
    }
}

/// One transactional session against a store.
///
/// A session is single-shot: `begin` once, issue operations, then exactly
/// one of `commit` or `rollback`. Every call blocks the current thread;
/// sessions are owned by one unit of work and never shared.
pub trait StoreSession: Send {
    /// Begins the transaction with the given options.
    fn begin(&mut self, options: &TxnOptions) -> StoreResult<()>;

    /// Commits all writes issued through this session.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards all writes issued through this session.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Returns the effective isolation level of the open transaction.
    fn isolation(&self) -> Isolation;

    /// Returns true when this session may issue writes.
    fn is_writable(&self) -> bool;

    /// Point lookup by identity. Uncommitted writes from this session are
    /// visible.
    fn find(&mut self, table: &str, identity: &Identity) -> StoreResult<Option<Row>>;

    /// Schedules an insert. Fails with `DuplicateKey` if a record with the
    /// same identity already exists (committed or pending in this session).
    fn persist(&mut self, table: &str, identity: &Identity, row: Row) -> StoreResult<()>;

    /// Schedules an insert-or-replace.
    fn merge(&mut self, table: &str, identity: &Identity, row: Row) -> StoreResult<()>;

    /// Schedules a point delete; returns the number of rows removed (0 or 1).
    fn remove(&mut self, table: &str, identity: &Identity) -> StoreResult<u64>;

    /// Runs a filtered select. Uncommitted writes from this session are
    /// visible.
    fn select(&mut self, query: &Select) -> StoreResult<Vec<Row>>;

    /// Counts rows matching the predicates, independent of any limit.
    fn count(&mut self, table: &str, predicates: &[Predicate]) -> StoreResult<u64>;

    /// Fetches the next value from the store's shared monotonic sequence.
    ///
    /// Fetching a sequence value is itself a write operation; read-only
    /// sessions fail with `ReadOnly`.
    fn next_sequence_value(&mut self) -> StoreResult<i64>;
}

/// A handle to a store that can open transactional sessions.
pub trait Store: Send + Sync {
    /// Opens a fresh session. Each unit of work gets its own.
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>>;

    /// The store's configured default isolation level.
    fn default_isolation(&self) -> Isolation;

    /// Returns false for read-only replicas.
    fn is_writable(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(c, v)| ((*c).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn compare_predicate_matches() {
        let r = row(&[("size", Value::Int(5))]);
        assert!(Predicate::eq("size", Value::Int(5)).matches(&r));
        assert!(Predicate::Compare {
            column: "size".into(),
            op: CompareOp::Gte,
            value: Value::Int(5),
        }
        .matches(&r));
        assert!(!Predicate::Compare {
            column: "size".into(),
            op: CompareOp::Lt,
            value: Value::Int(5),
        }
        .matches(&r));
    }

    #[test]
    fn missing_column_does_not_match() {
        let r = row(&[("size", Value::Int(5))]);
        assert!(!Predicate::eq("weight", Value::Int(5)).matches(&r));
    }

    #[test]
    fn cross_type_comparison_does_not_match() {
        let r = row(&[("size", Value::Int(5))]);
        assert!(!Predicate::eq("size", Value::Text("5".into())).matches(&r));
    }

    #[test]
    fn in_predicate() {
        let r = row(&[("tld", Value::Text("dev".into()))]);
        let p = Predicate::In {
            column: "tld".into(),
            values: vec![Value::Text("app".into()), Value::Text("dev".into())],
        };
        assert!(p.matches(&r));
        let p = Predicate::In {
            column: "tld".into(),
            values: vec![Value::Text("app".into())],
        };
        assert!(!p.matches(&r));
    }

    #[test]
    fn isolation_display_uses_sql_modes() {
        assert_eq!(Isolation::Serializable.to_string(), "SERIALIZABLE");
        assert_eq!(Isolation::ReadCommitted.to_string(), "READ COMMITTED");
    }
}
