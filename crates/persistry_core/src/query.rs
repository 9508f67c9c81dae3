//! Fluent query building over an entity's table.
//!
//! A [`QueryComposer`] accumulates predicates and ordering, then runs as
//! a list, a single-result lookup, a count, or a chunked stream. Results
//! are detached like every other load.

use crate::entity::Entity;
use crate::error::{PersistError, PersistResult};
use crate::transaction::state::Txn;
use persistry_store::{CompareOp, Predicate, Row, Select, Value};
use std::collections::VecDeque;
use std::marker::PhantomData;
use tracing::warn;

/// Number of rows a [`QueryStream`] pulls from the store per fetch.
pub const DEFAULT_FETCH_SIZE: usize = 1000;

impl Txn {
    /// Starts a query over an entity's table.
    #[must_use]
    pub fn query<E: Entity>(&self) -> QueryComposer<'_, E> {
        QueryComposer {
            txn: self,
            select: Select::new(E::TABLE),
            fetch_size: DEFAULT_FETCH_SIZE,
            _entity: PhantomData,
        }
    }
}

/// A query under construction against one entity table.
pub struct QueryComposer<'t, E: Entity> {
    txn: &'t Txn,
    select: Select,
    fetch_size: usize,
    _entity: PhantomData<E>,
}

impl<'t, E: Entity> QueryComposer<'t, E> {
    /// Requires a column to equal a value.
    #[must_use]
    pub fn where_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.select.predicates.push(Predicate::eq(column, value));
        self
    }

    /// Requires a column to compare against a value with the given
    /// operator.
    #[must_use]
    pub fn where_cmp(mut self, column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        self.select.predicates.push(Predicate::Compare {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// Requires a column's value to be one of the given values.
    #[must_use]
    pub fn where_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.select.predicates.push(Predicate::In {
            column: column.into(),
            values,
        });
        self
    }

    /// Sorts results ascending by a column.
    #[must_use]
    pub fn order_by_asc(mut self, column: impl Into<String>) -> Self {
        self.select.order_by = Some(column.into());
        self
    }

    /// Overrides the stream fetch size.
    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Runs the query and returns all matches.
    pub fn list(self) -> PersistResult<Vec<E>> {
        let rows = self.fetch(&self.select)?;
        rows.iter().map(|row| self.txn.detach::<E>(row)).collect()
    }

    /// Runs the query and returns the first match, if any.
    pub fn first(self) -> PersistResult<Option<E>> {
        let mut select = self.select.clone();
        select.limit = Some(1);
        let rows = self.fetch(&select)?;
        match rows.first() {
            Some(row) => Ok(Some(self.txn.detach::<E>(row)?)),
            None => Ok(None),
        }
    }

    /// Runs the query expecting exactly one match.
    pub fn get_single_result(self) -> PersistResult<E> {
        let mut select = self.select.clone();
        select.limit = Some(2);
        let rows = self.fetch(&select)?;
        match rows.len() {
            1 => self.txn.detach::<E>(&rows[0]),
            found => Err(PersistError::NonUniqueResult {
                table: E::TABLE.to_owned(),
                found,
            }),
        }
    }

    /// Counts matching rows without loading them.
    pub fn count(self) -> PersistResult<u64> {
        self.txn
            .with_session(|session| Ok(session.count(E::TABLE, &self.select.predicates)?))
    }

    /// Runs the query as a stream that pulls rows from the store in
    /// chunks of the configured fetch size.
    #[must_use]
    pub fn stream(self) -> QueryStream<'t, E> {
        let mut fetch_size = self.fetch_size;
        if fetch_size == 0 {
            // A zero chunk size cannot paginate; fall back to one fetch.
            warn!(
                table = E::TABLE,
                "query stream fetch size is 0, fetching all rows at once"
            );
            fetch_size = usize::MAX;
        }
        QueryStream {
            txn: self.txn,
            select: self.select,
            fetch_size,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            _entity: PhantomData,
        }
    }

    fn fetch(&self, select: &Select) -> PersistResult<Vec<Row>> {
        self.txn.with_session(|session| Ok(session.select(select)?))
    }
}

/// Iterator over query results, fetched chunk by chunk.
pub struct QueryStream<'t, E: Entity> {
    txn: &'t Txn,
    select: Select,
    fetch_size: usize,
    offset: usize,
    buffer: VecDeque<Row>,
    exhausted: bool,
    _entity: PhantomData<E>,
}

impl<E: Entity> QueryStream<'_, E> {
    fn refill(&mut self) -> PersistResult<()> {
        let mut select = self.select.clone();
        select.offset = self.offset;
        select.limit = (self.fetch_size < usize::MAX).then_some(self.fetch_size);
        let rows = self
            .txn
            .with_session(|session| Ok(session.select(&select)?))?;
        if rows.len() < self.fetch_size {
            self.exhausted = true;
        }
        self.offset += rows.len();
        self.buffer.extend(rows);
        Ok(())
    }
}

impl<E: Entity> Iterator for QueryStream<'_, E> {
    type Item = PersistResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.refill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        let row = self.buffer.pop_front()?;
        Some(self.txn.detach::<E>(&row))
    }
}
