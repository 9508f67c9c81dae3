//! Detachment of loaded rows.
//!
//! Every load made through the coordinator hands back an owned copy that
//! is decoded from the stored row. Mutating the copy never touches the
//! store without an explicit `update`/`put`. Loading back an entity that
//! the open transaction has already written is a bug: the caller would
//! observe the overlay row and may silently diverge from the copy it
//! mutated, so those reloads fail instead.

use crate::entity::{identity_from_row, Entity};
use crate::error::{PersistError, PersistResult};
use persistry_store::{Identity, Row};

/// Checks whether an identity was written earlier in the open transaction.
pub(crate) type PendingCheck<'a> = dyn Fn(&str, &Identity) -> bool + 'a;

/// Decodes a stored row into an owned entity, refusing rows whose
/// identity was already written in the open transaction.
pub(crate) fn detach_row<E: Entity>(row: &Row, pending: &PendingCheck<'_>) -> PersistResult<E> {
    let identity = identity_from_row::<E>(row)?;
    if pending(E::TABLE, &identity) {
        return Err(PersistError::ReloadedPendingWrite {
            table: E::TABLE.to_owned(),
            identity: identity.to_string(),
        });
    }
    E::from_row(row)
}

/// Detaches a raw query row. The reload guard only applies when the row
/// carries every identity column of the queried table; projections that
/// drop key columns pass through untouched.
pub(crate) fn detach_raw_row(
    table: &str,
    id_columns: &[&str],
    row: &Row,
    pending: &PendingCheck<'_>,
) -> PersistResult<Row> {
    if id_columns.iter().all(|column| row.contains_key(*column)) {
        let pairs = id_columns
            .iter()
            .map(|column| ((*column).to_owned(), row[*column].clone()))
            .collect::<Vec<_>>();
        let identity = Identity::new(pairs);
        if pending(table, &identity) {
            return Err(PersistError::ReloadedPendingWrite {
                table: table.to_owned(),
                identity: identity.to_string(),
            });
        }
    }
    Ok(row.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::row_i64;
    use persistry_store::Value;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
    }

    impl Entity for Item {
        const TABLE: &'static str = "item";
        const ID_COLUMNS: &'static [&'static str] = &["id"];

        fn to_row(&self) -> Row {
            let mut row = Row::new();
            row.insert("id".into(), Value::Int(self.id));
            row
        }

        fn from_row(row: &Row) -> PersistResult<Self> {
            Ok(Self {
                id: row_i64(row, "id")?,
            })
        }
    }

    #[test]
    fn clean_rows_detach() {
        let row = Item { id: 1 }.to_row();
        let item: Item = detach_row(&row, &|_, _| false).unwrap();
        assert_eq!(item, Item { id: 1 });
    }

    #[test]
    fn pending_rows_are_refused() {
        let row = Item { id: 1 }.to_row();
        let err = detach_row::<Item>(&row, &|table, identity| {
            table == "item" && *identity == Identity::single("id", Value::Int(1))
        })
        .unwrap_err();
        assert!(matches!(err, PersistError::ReloadedPendingWrite { .. }));
    }

    #[test]
    fn raw_projection_without_key_columns_passes() {
        let mut row = Row::new();
        row.insert("name".into(), Value::Text("anvil".into()));
        let detached = detach_raw_row("item", &["id"], &row, &|_, _| true).unwrap();
        assert_eq!(detached, row);
    }

    #[test]
    fn raw_row_with_pending_key_is_refused() {
        let row = Item { id: 9 }.to_row();
        let err = detach_raw_row("item", &["id"], &row, &|_, _| true).unwrap_err();
        assert!(matches!(err, PersistError::ReloadedPendingWrite { .. }));
    }
}
