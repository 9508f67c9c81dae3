//! Record identities.

use crate::value::{Row, Value};
use std::fmt;

/// The identity of a stored record: one or more (column, value) pairs that
/// uniquely address it.
///
/// Pairs are kept in canonical (column-name) order so that two identities
/// built from the same columns in different orders compare, hash, and
/// encode identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pairs: Vec<(String, Value)>,
}

impl Identity {
    /// Creates an identity from (column, value) pairs.
    ///
    /// The pairs are sorted into canonical order; duplicate columns keep
    /// their last value.
    #[must_use]
    pub fn new(mut pairs: Vec<(String, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|a, b| a.0 == b.0);
        Self { pairs }
    }

    /// Creates a single-column identity.
    #[must_use]
    pub fn single(column: impl Into<String>, value: Value) -> Self {
        Self {
            pairs: vec![(column.into(), value)],
        }
    }

    /// Returns the (column, value) pairs in canonical order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// Returns the number of key columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when the identity has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Checks whether every identity column matches the given row.
    ///
    /// A row missing an identity column does not match.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.pairs
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }

    /// Encodes the identity into canonical bytes, suitable as a map key.
    #[must_use]
    pub fn key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (column, value) in &self.pairs {
            out.extend_from_slice(&(column.len() as u32).to_be_bytes());
            out.extend_from_slice(column.as_bytes());
            match value {
                Value::Null => out.push(0),
                Value::Bool(b) => {
                    out.push(1);
                    out.push(u8::from(*b));
                }
                Value::Int(i) => {
                    out.push(2);
                    // Flip the sign bit so byte order matches numeric order.
                    out.extend_from_slice(&(*i as u64 ^ (1 << 63)).to_be_bytes());
                }
                Value::Float(x) => {
                    out.push(3);
                    out.extend_from_slice(&x.to_bits().to_be_bytes());
                }
                Value::Text(s) => {
                    out.push(4);
                    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                Value::Bytes(b) => {
                    out.push(5);
                    out.extend_from_slice(&(b.len() as u32).to_be_bytes());
                    out.extend_from_slice(b);
                }
            }
        }
        out
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (column, value) in &self.pairs {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{column}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_order_is_canonical() {
        let a = Identity::new(vec![
            ("tld".into(), Value::Text("dev".into())),
            ("label".into(), Value::Text("gold".into())),
        ]);
        let b = Identity::new(vec![
            ("label".into(), Value::Text("gold".into())),
            ("tld".into(), Value::Text("dev".into())),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.key_bytes(), b.key_bytes());
    }

    #[test]
    fn matches_requires_all_columns() {
        let identity = Identity::new(vec![
            ("label".into(), Value::Text("gold".into())),
            ("tld".into(), Value::Text("dev".into())),
        ]);

        let mut row = Row::new();
        row.insert("label".into(), Value::Text("gold".into()));
        row.insert("tld".into(), Value::Text("dev".into()));
        row.insert("reason".into(), Value::Text("premium".into()));
        assert!(identity.matches(&row));

        row.insert("tld".into(), Value::Text("app".into()));
        assert!(!identity.matches(&row));

        let mut partial = Row::new();
        partial.insert("label".into(), Value::Text("gold".into()));
        assert!(!identity.matches(&partial));
    }

    #[test]
    fn int_key_bytes_order_matches_numeric_order() {
        let low = Identity::single("id", Value::Int(-5)).key_bytes();
        let mid = Identity::single("id", Value::Int(0)).key_bytes();
        let high = Identity::single("id", Value::Int(12)).key_bytes();
        assert!(low < mid);
        assert!(mid < high);
    }

    #[test]
    fn distinct_values_encode_distinctly() {
        let a = Identity::single("id", Value::Int(1)).key_bytes();
        let b = Identity::single("id", Value::Int(2)).key_bytes();
        assert_ne!(a, b);
    }

    #[test]
    fn display_lists_pairs() {
        let identity = Identity::new(vec![
            ("tld".into(), Value::Text("dev".into())),
            ("label".into(), Value::Text("gold".into())),
        ]);
        assert_eq!(identity.to_string(), "label='gold', tld='dev'");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn key_bytes_invariant_under_pair_order(a in "[a-z]{1,8}", b in "[a-z]{1,8}", x: i64, y: i64) {
                prop_assume!(a != b);
                let fwd = Identity::new(vec![(a.clone(), Value::Int(x)), (b.clone(), Value::Int(y))]);
                let rev = Identity::new(vec![(b, Value::Int(y)), (a, Value::Int(x))]);
                prop_assert_eq!(fwd.key_bytes(), rev.key_bytes());
            }

            #[test]
            fn distinct_int_keys_encode_distinctly(x: i64, y: i64) {
                prop_assume!(x != y);
                let a = Identity::single("id", Value::Int(x));
                let b = Identity::single("id", Value::Int(y));
                prop_assert_ne!(a.key_bytes(), b.key_bytes());
            }
        }
    }
}
