//! Secondary index for enforcing unique constraints.
//!
//! Maps unique field values to the id of the record holding them. Writes go
//! through a [`Transaction`] so claims commit together with the record.

use sled::Tree;

use crate::error::{ConstraintError, Error};
use crate::storage::{EntityId, StorageEngine, Transaction};

/// Secondary index for enforcing unique constraints.
///
/// Key format: `entity\0constraint\0value1\0value2...` -> `entity_id`
#[derive(Clone)]
pub struct UniqueIndex {
    tree: Tree,
}

impl UniqueIndex {
    /// Open the unique index stored in the engine.
    pub fn open(engine: &StorageEngine) -> Self {
        Self {
            tree: engine.unique_tree().clone(),
        }
    }

    /// Build the index key for a unique constraint.
    pub fn build_key(entity: &str, constraint: &str, values: &[String]) -> Vec<u8> {
        let mut key = Vec::new();
        key.extend_from_slice(entity.as_bytes());
        key.push(0);
        key.extend_from_slice(constraint.as_bytes());
        for value in values {
            key.push(0);
            key.extend_from_slice(value.as_bytes());
        }
        key
    }

    /// Look up the committed owner of a unique value.
    pub fn lookup(
        &self,
        entity: &str,
        constraint: &str,
        values: &[String],
    ) -> Result<Option<EntityId>, Error> {
        let key = Self::build_key(entity, constraint, values);

        match self.tree.get(&key)? {
            Some(bytes) => {
                let id: EntityId = bytes.as_ref().try_into().map_err(|_| Error::InvalidKey)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Queue a claim of `values` for `entity_id`.
    ///
    /// Fails if another record holds the values, either committed or pending
    /// in `tx`. Re-claiming one's own values is allowed.
    pub fn claim(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        constraint: &str,
        fields: &[String],
        values: &[String],
        entity_id: EntityId,
    ) -> Result<(), Error> {
        let key = Self::build_key(entity, constraint, values);

        match tx.unique_owner(&key)? {
            Some(owner) if owner != entity_id => {
                Err(Error::ConstraintViolation(ConstraintError::UniqueViolation {
                    constraint: constraint.to_string(),
                    entity: entity.to_string(),
                    fields: fields.to_vec(),
                    value: values.join(", "),
                }))
            }
            Some(_) => Ok(()),
            None => {
                tx.claim_unique(key, entity_id);
                Ok(())
            }
        }
    }

    /// Queue the release of `values`.
    pub fn release(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        constraint: &str,
        values: &[String],
    ) {
        tx.release_unique(Self::build_key(entity, constraint, values));
    }

    /// Get the number of committed entries in the index.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
