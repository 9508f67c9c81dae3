//! Typed persistence operations on the transaction handle.
//!
//! Every load hands back a detached copy; every write records the
//! entity's identity so a later reload of the same record inside the
//! same transaction fails instead of silently returning the overlay row.

use crate::detach::{detach_raw_row, detach_row};
use crate::entity::{identity_for_key, identity_of, Entity, Key};
use crate::error::{PersistError, PersistResult};
use crate::transaction::state::Txn;
use persistry_store::{Row, Select};
use std::collections::HashMap;

impl Txn {
    /// Inserts a new entity. Fails with a duplicate-key error when a
    /// record with the same identity already exists.
    pub fn insert<E: Entity>(&self, entity: &E) -> PersistResult<()> {
        self.ensure_writable()?;
        let identity = identity_of(entity)?;
        let row = entity.to_row();
        self.with_session(|session| Ok(session.persist(E::TABLE, &identity, row)?))?;
        self.note_pending(E::TABLE, identity);
        Ok(())
    }

    /// Inserts a batch of new entities.
    pub fn insert_all<E: Entity>(&self, entities: &[E]) -> PersistResult<()> {
        for entity in entities {
            self.insert(entity)?;
        }
        Ok(())
    }

    /// Inserts or replaces an entity.
    pub fn put<E: Entity>(&self, entity: &E) -> PersistResult<()> {
        self.ensure_writable()?;
        let identity = identity_of(entity)?;
        let row = entity.to_row();
        self.with_session(|session| Ok(session.merge(E::TABLE, &identity, row)?))?;
        self.note_pending(E::TABLE, identity);
        Ok(())
    }

    /// Inserts or replaces a batch of entities.
    pub fn put_all<E: Entity>(&self, entities: &[E]) -> PersistResult<()> {
        for entity in entities {
            self.put(entity)?;
        }
        Ok(())
    }

    /// Replaces an existing entity. Fails with
    /// [`PersistError::EntityDoesNotExist`] when no record with the
    /// entity's identity exists, without writing anything.
    pub fn update<E: Entity>(&self, entity: &E) -> PersistResult<()> {
        self.ensure_writable()?;
        let identity = identity_of(entity)?;
        let existing = self.with_session(|session| Ok(session.find(E::TABLE, &identity)?))?;
        if existing.is_none() {
            return Err(PersistError::EntityDoesNotExist {
                table: E::TABLE.to_owned(),
                identity: identity.to_string(),
            });
        }
        let row = entity.to_row();
        self.with_session(|session| Ok(session.merge(E::TABLE, &identity, row)?))?;
        self.note_pending(E::TABLE, identity);
        Ok(())
    }

    /// Replaces a batch of existing entities. Stops at the first entity
    /// that does not exist.
    pub fn update_all<E: Entity>(&self, entities: &[E]) -> PersistResult<()> {
        for entity in entities {
            self.update(entity)?;
        }
        Ok(())
    }

    /// Deletes the record addressed by a key; returns the number of rows
    /// removed (0 or 1).
    pub fn delete<E: Entity>(&self, key: &Key) -> PersistResult<u64> {
        self.ensure_writable()?;
        let identity = identity_for_key::<E>(key)?;
        self.with_session(|session| Ok(session.remove(E::TABLE, &identity)?))
    }

    /// Deletes the record matching an entity's identity.
    pub fn delete_entity<E: Entity>(&self, entity: &E) -> PersistResult<u64> {
        self.ensure_writable()?;
        let identity = identity_of(entity)?;
        self.with_session(|session| Ok(session.remove(E::TABLE, &identity)?))
    }

    /// Deletes the record addressed by a key, failing unless exactly one
    /// row was removed.
    pub fn assert_delete<E: Entity>(&self, key: &Key) -> PersistResult<()> {
        let identity = identity_for_key::<E>(key)?;
        let removed = self.delete::<E>(key)?;
        if removed == 1 {
            Ok(())
        } else {
            Err(PersistError::DeleteFailed {
                table: E::TABLE.to_owned(),
                identity: identity.to_string(),
                removed,
            })
        }
    }

    /// Loads the entity addressed by a key, failing when it is absent.
    pub fn load_by_key<E: Entity>(&self, key: &Key) -> PersistResult<E> {
        let identity = identity_for_key::<E>(key)?;
        self.load_by_key_if_present::<E>(key)?
            .ok_or_else(|| PersistError::NotFound {
                table: E::TABLE.to_owned(),
                identity: identity.to_string(),
            })
    }

    /// Loads the entity addressed by a key if it exists.
    pub fn load_by_key_if_present<E: Entity>(&self, key: &Key) -> PersistResult<Option<E>> {
        let identity = identity_for_key::<E>(key)?;
        let row = self.with_session(|session| Ok(session.find(E::TABLE, &identity)?))?;
        match row {
            Some(row) => Ok(Some(self.detach::<E>(&row)?)),
            None => Ok(None),
        }
    }

    /// Loads a batch of entities by key, failing when any of them is
    /// absent. The result is keyed by the caller's keys.
    pub fn load_by_keys<E: Entity>(&self, keys: &[Key]) -> PersistResult<HashMap<Key, E>> {
        let mut loaded = HashMap::with_capacity(keys.len());
        for key in keys {
            let entity = self.load_by_key::<E>(key)?;
            loaded.insert(key.clone(), entity);
        }
        Ok(loaded)
    }

    /// Loads a batch of entities by key, skipping absent ones.
    pub fn load_by_keys_if_present<E: Entity>(
        &self,
        keys: &[Key],
    ) -> PersistResult<HashMap<Key, E>> {
        let mut loaded = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entity) = self.load_by_key_if_present::<E>(key)? {
                loaded.insert(key.clone(), entity);
            }
        }
        Ok(loaded)
    }

    /// Loads every record of an entity's table.
    pub fn load_all_of<E: Entity>(&self) -> PersistResult<Vec<E>> {
        let rows = self.with_session(|session| Ok(session.select(&Select::new(E::TABLE))?))?;
        rows.iter().map(|row| self.detach::<E>(row)).collect()
    }

    /// Loads the single record of a table expected to hold at most one
    /// row, such as a global configuration record.
    pub fn load_singleton<E: Entity>(&self) -> PersistResult<Option<E>> {
        let mut select = Select::new(E::TABLE);
        // Two rows are enough to prove non-uniqueness.
        select.limit = Some(2);
        let rows = self.with_session(|session| Ok(session.select(&select)?))?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(self.detach::<E>(&rows[0])?)),
            found => Err(PersistError::NonUniqueResult {
                table: E::TABLE.to_owned(),
                found,
            }),
        }
    }

    /// True when a record with the given key exists.
    pub fn exists<E: Entity>(&self, key: &Key) -> PersistResult<bool> {
        let identity = identity_for_key::<E>(key)?;
        self.exists_identity::<E>(&identity)
    }

    /// True when a record matching the entity's identity exists.
    pub fn exists_entity<E: Entity>(&self, entity: &E) -> PersistResult<bool> {
        let identity = identity_of(entity)?;
        self.exists_identity::<E>(&identity)
    }

    fn exists_identity<E: Entity>(
        &self,
        identity: &persistry_store::Identity,
    ) -> PersistResult<bool> {
        let mut select = Select::new(E::TABLE);
        select.predicates = identity
            .pairs()
            .iter()
            .map(|(column, value)| persistry_store::Predicate::eq(column.clone(), value.clone()))
            .collect();
        select.limit = Some(1);
        let rows = self.with_session(|session| Ok(session.select(&select)?))?;
        Ok(!rows.is_empty())
    }

    /// Runs a raw select over an entity's table, returning detached rows.
    pub fn select_rows<E: Entity>(&self, mut select: Select) -> PersistResult<Vec<Row>> {
        select.table = E::TABLE.to_owned();
        let rows = self.with_session(|session| Ok(session.select(&select)?))?;
        let pending = |table: &str, identity: &persistry_store::Identity| {
            self.is_pending(table, identity)
        };
        rows.iter()
            .map(|row| detach_raw_row(E::TABLE, E::ID_COLUMNS, row, &pending))
            .collect()
    }

    pub(crate) fn detach<E: Entity>(&self, row: &Row) -> PersistResult<E> {
        let pending = |table: &str, identity: &persistry_store::Identity| {
            self.is_pending(table, identity)
        };
        detach_row::<E>(row, &pending)
    }
}
