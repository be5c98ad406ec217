//! Mutation executor for write operations.
//!
//! Every write takes the database write lock, validates against the current
//! schema, and commits in a single storage transaction.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::cascade::{CascadeExecutor, CascadeResult};
use crate::codec::{decode_entity, encode_entity};
use crate::constraint::ConstraintValidator;
use crate::database::Database;
use crate::error::Error;
use crate::lookup::Row;
use crate::storage::{EntityId, Record, StorageEngine, Transaction};
use crate::value::Value;

/// A record to insert, with its id assigned up front.
///
/// Knowing the id before the write lets later records in the same batch
/// reference it.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Entity type.
    pub entity: String,
    /// Id the record will be stored under.
    pub id: EntityId,
    /// Field values, excluding the identity field.
    pub fields: Vec<(String, Value)>,
}

impl NewRecord {
    /// Create a record with a freshly generated id.
    pub fn new(entity: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            entity: entity.into(),
            id: StorageEngine::generate_id(),
            fields,
        }
    }

    /// Add a field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    /// Entity type of the deleted record.
    pub entity: String,
    /// Id of the deleted record.
    pub id: EntityId,
    /// Effects on referencing records.
    pub cascade: CascadeResult,
}

impl DeleteOutcome {
    /// Deleted record counts per entity type, the root included.
    pub fn deleted_by_entity(&self) -> BTreeMap<String, usize> {
        let mut counts = self.cascade.deleted_by_entity();
        *counts.entry(self.entity.clone()).or_insert(0) += 1;
        counts
    }

    /// Total number of deleted records, the root included.
    pub fn total_deleted(&self) -> usize {
        self.cascade.deleted_entities.len() + 1
    }
}

/// Executes mutation operations against the database.
pub struct MutationExecutor<'a> {
    database: &'a Database,
}

impl<'a> MutationExecutor<'a> {
    /// Create a new mutation executor.
    pub fn new(database: &'a Database) -> Self {
        Self { database }
    }

    /// Insert a single record.
    pub fn insert(&self, entity: &str, fields: Vec<(String, Value)>) -> Result<Row, Error> {
        let mut rows = self.insert_batch(vec![NewRecord::new(entity, fields)])?;
        rows.pop()
            .ok_or_else(|| Error::InvalidData("insert produced no row".into()))
    }

    /// Insert several records atomically.
    ///
    /// Records may reference earlier records of the same batch. Either every
    /// record is stored or none is.
    pub fn insert_batch(&self, records: Vec<NewRecord>) -> Result<Vec<Row>, Error> {
        let entities: Vec<String> = records.iter().map(|r| r.entity.clone()).collect();
        self.do_insert_batch(records).inspect_err(|e| {
            warn!(entities = ?entities, error = %e, "insert rejected");
        })
    }

    fn do_insert_batch(&self, records: Vec<NewRecord>) -> Result<Vec<Row>, Error> {
        let _guard = self.database.write_lock();
        let schema = self.database.schema()?;
        let storage = self.database.storage();
        let validator = ConstraintValidator::new(&schema, storage, self.database.unique_index());

        let mut tx = storage.transaction();
        let mut rows = Vec::with_capacity(records.len());

        for NewRecord { entity, id, fields } in records {
            let record = validator.prepare_insert(&entity, id, fields)?;
            validator.check_insert(&mut tx, &entity, id, &record)?;
            tx.insert(entity.as_str(), id, Record::new(encode_entity(&record)?));
            rows.push(Row::new(entity, id, record));
        }

        tx.commit()?;

        for row in &rows {
            debug!(entity = %row.entity, id = %row.id_hex(), "inserted");
        }
        Ok(rows)
    }

    /// Update fields of an existing record.
    ///
    /// Fields not named in `changes` keep their values; a `Value::Null` change
    /// clears an optional field.
    pub fn update(
        &self,
        entity: &str,
        id: &EntityId,
        changes: Vec<(String, Value)>,
    ) -> Result<Row, Error> {
        self.do_update(entity, id, changes).inspect_err(|e| {
            warn!(entity, id = %hex::encode(id), error = %e, "update rejected");
        })
    }

    fn do_update(
        &self,
        entity: &str,
        id: &EntityId,
        changes: Vec<(String, Value)>,
    ) -> Result<Row, Error> {
        let _guard = self.database.write_lock();
        let schema = self.database.schema()?;
        let storage = self.database.storage();
        let validator = ConstraintValidator::new(&schema, storage, self.database.unique_index());
        validator.entity(entity)?;

        let (_, current) = storage
            .get_typed(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?;
        let before = decode_entity(&current.data)?;
        let after = validator.prepare_update(entity, before.clone(), changes)?;

        let mut tx = storage.transaction();
        validator.check_update(&mut tx, entity, *id, &before, &after)?;
        tx.insert(entity, *id, Record::new(encode_entity(&after)?));
        tx.commit()?;

        debug!(entity, id = %hex::encode(id), "updated");
        Ok(Row::new(entity, *id, after))
    }

    /// Delete a record and apply the delete behavior of every relation
    /// pointing at it.
    pub fn delete(&self, entity: &str, id: &EntityId) -> Result<DeleteOutcome, Error> {
        self.do_delete(entity, id).inspect_err(|e| {
            warn!(entity, id = %hex::encode(id), error = %e, "delete rejected");
        })
    }

    fn do_delete(&self, entity: &str, id: &EntityId) -> Result<DeleteOutcome, Error> {
        let _guard = self.database.write_lock();
        let schema = self.database.schema()?;
        let storage = self.database.storage();
        let validator = ConstraintValidator::new(&schema, storage, self.database.unique_index());
        validator.entity(entity)?;

        let (_, current) = storage
            .get_typed(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?;

        let mut tx = storage.transaction();
        let outcome = queue_delete(&validator, &mut tx, entity, *id, &current)?;
        tx.commit()?;

        debug!(
            entity,
            id = %hex::encode(id),
            cascaded = outcome.cascade.deleted_entities.len(),
            "deleted"
        );
        Ok(outcome)
    }

    /// Delete every record of `entity`, cascading as [`Self::delete`] does.
    ///
    /// All deletes commit in one transaction. Records already removed by an
    /// earlier cascade of the same call are skipped.
    pub fn delete_all(&self, entity: &str) -> Result<Vec<DeleteOutcome>, Error> {
        self.do_delete_all(entity).inspect_err(|e| {
            warn!(entity, error = %e, "bulk delete rejected");
        })
    }

    fn do_delete_all(&self, entity: &str) -> Result<Vec<DeleteOutcome>, Error> {
        let _guard = self.database.write_lock();
        let schema = self.database.schema()?;
        let storage = self.database.storage();
        let validator = ConstraintValidator::new(&schema, storage, self.database.unique_index());
        validator.entity(entity)?;

        let targets: Vec<(EntityId, Record)> = storage
            .scan_entity_type(entity)
            .map(|entry| entry.map(|(id, _, record)| (id, record)))
            .collect::<Result<_, _>>()?;

        let mut tx = storage.transaction();
        let mut outcomes = Vec::with_capacity(targets.len());
        for (id, current) in targets {
            if tx.is_deleting(&id) {
                continue;
            }
            outcomes.push(queue_delete(&validator, &mut tx, entity, id, &current)?);
        }
        tx.commit()?;

        debug!(entity, deleted = outcomes.len(), "deleted all");
        Ok(outcomes)
    }
}

/// Queue the delete of one live record and its cascade on `tx`.
fn queue_delete(
    validator: &ConstraintValidator<'_>,
    tx: &mut Transaction<'_>,
    entity: &str,
    id: EntityId,
    current: &Record,
) -> Result<DeleteOutcome, Error> {
    let fields = decode_entity(&current.data)?;

    validator.validate_delete(tx, entity, id)?;
    let cascade = CascadeExecutor::new(validator, tx.engine()).process_delete(entity, id, tx)?;

    validator.release_unique(tx, entity, &fields);
    tx.delete_typed(entity, id);

    Ok(DeleteOutcome {
        entity: entity.to_string(),
        id,
        cascade,
    })
}
