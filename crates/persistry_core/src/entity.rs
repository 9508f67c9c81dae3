//! Entity schema descriptors and key resolution.
//!
//! Instead of runtime field introspection, every persisted type declares
//! its table, its ordered key columns, and row conversions once, through
//! the [`Entity`] trait. Point lookups, existence checks, and deletes are
//! built from that metadata; there is no per-call-site key plumbing.

use crate::error::{PersistError, PersistResult};
use persistry_store::{Identity, Row, Value};
use std::fmt;

/// A persisted record type.
///
/// Implementations are the compile-time schema descriptor for one table:
/// identity columns in declaration order plus conversions between the
/// typed entity and its stored row.
pub trait Entity: Clone + Send + 'static {
    /// Table the entity is stored in.
    const TABLE: &'static str;

    /// Identity columns, in declaration order. One entry for single-key
    /// types, several for composite keys.
    const ID_COLUMNS: &'static [&'static str];

    /// Converts the entity into its stored row. Every identity column
    /// must be present in the result.
    fn to_row(&self) -> Row;

    /// Rebuilds the entity from a stored row.
    fn from_row(row: &Row) -> PersistResult<Self>;
}

/// A typed key value addressing one record of some entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Key for a single-column identity.
    Single(Value),
    /// Key for a composite identity: (column, value) pairs covering every
    /// declared identity column.
    Composite(Vec<(String, Value)>),
}

impl Key {
    /// Convenience constructor for an integer single key.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Key::Single(Value::Int(value))
    }

    /// Convenience constructor for a text single key.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Key::Single(Value::Text(value.into()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Single(value) => write!(f, "{value}"),
            Key::Composite(pairs) => {
                let mut first = true;
                for (column, value) in pairs {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{column}={value}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

/// Resolves the identity of a materialized entity from its own row.
pub fn identity_of<E: Entity>(entity: &E) -> PersistResult<Identity> {
    let row = entity.to_row();
    identity_from_row::<E>(&row)
}

/// Resolves an identity from a row that contains the entity's identity
/// columns.
pub fn identity_from_row<E: Entity>(row: &Row) -> PersistResult<Identity> {
    let mut pairs = Vec::with_capacity(E::ID_COLUMNS.len());
    for column in E::ID_COLUMNS {
        let value = row.get(*column).ok_or_else(|| {
            PersistError::invalid_argument(format!(
                "entity row for {} is missing identity column {column}",
                E::TABLE
            ))
        })?;
        pairs.push(((*column).to_owned(), value.clone()));
    }
    Ok(Identity::new(pairs))
}

/// Resolves an identity from a raw key value, checking it against the
/// entity's declared identity columns.
pub fn identity_for_key<E: Entity>(key: &Key) -> PersistResult<Identity> {
    match key {
        Key::Single(value) => {
            if E::ID_COLUMNS.len() != 1 {
                return Err(PersistError::invalid_argument(format!(
                    "{} has a composite key of {} columns; a single value cannot address it",
                    E::TABLE,
                    E::ID_COLUMNS.len()
                )));
            }
            Ok(Identity::single(E::ID_COLUMNS[0], value.clone()))
        }
        Key::Composite(pairs) => {
            if pairs.len() != E::ID_COLUMNS.len() {
                return Err(PersistError::invalid_argument(format!(
                    "{} declares {} identity columns, key supplies {}",
                    E::TABLE,
                    E::ID_COLUMNS.len(),
                    pairs.len()
                )));
            }
            for column in E::ID_COLUMNS {
                if !pairs.iter().any(|(c, _)| c == column) {
                    return Err(PersistError::invalid_argument(format!(
                        "key for {} is missing identity column {column}",
                        E::TABLE
                    )));
                }
            }
            Ok(Identity::new(pairs.clone()))
        }
    }
}

/// Reads a required `i64` column from a row.
pub fn row_i64(row: &Row, column: &str) -> PersistResult<i64> {
    match row.get(column) {
        Some(Value::Int(v)) => Ok(*v),
        other => Err(column_error(column, "int", other)),
    }
}

/// Reads a required text column from a row.
pub fn row_text(row: &Row, column: &str) -> PersistResult<String> {
    match row.get(column) {
        Some(Value::Text(v)) => Ok(v.clone()),
        other => Err(column_error(column, "text", other)),
    }
}

/// Reads a required `bool` column from a row.
pub fn row_bool(row: &Row, column: &str) -> PersistResult<bool> {
    match row.get(column) {
        Some(Value::Bool(v)) => Ok(*v),
        other => Err(column_error(column, "bool", other)),
    }
}

/// Reads a required `f64` column from a row.
pub fn row_float(row: &Row, column: &str) -> PersistResult<f64> {
    match row.get(column) {
        Some(Value::Float(v)) => Ok(*v),
        other => Err(column_error(column, "float", other)),
    }
}

fn column_error(column: &str, expected: &str, actual: Option<&Value>) -> PersistError {
    match actual {
        Some(value) => PersistError::invalid_argument(format!(
            "column {column} has type {}, expected {expected}",
            value.type_name()
        )),
        None => PersistError::invalid_argument(format!("row is missing column {column}")),
    }
}
