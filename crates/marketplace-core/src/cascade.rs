//! Cascade executor for referential integrity on deletes.
//!
//! For every relation pointing at the entity being deleted:
//! - CASCADE: delete referencing records, recursively
//! - RESTRICT: refuse the delete while references exist
//! - SET NULL: null out the foreign key on referencing records

use std::collections::{BTreeMap, HashSet};

use crate::catalog::DeleteBehavior;
use crate::codec::{decode_entity, encode_entity};
use crate::constraint::ConstraintValidator;
use crate::error::{CascadeError, Error};
use crate::storage::{EntityId, Record, StorageEngine, Transaction};
use crate::value::Value;

/// Maximum cascade depth.
const MAX_CASCADE_DEPTH: usize = 100;

/// Result of a cascade operation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CascadeResult {
    /// Records deleted because they referenced the deleted record.
    pub deleted_entities: Vec<(String, EntityId)>,
    /// Records whose foreign key was set to null: (entity, id, field).
    pub nullified_fields: Vec<(String, EntityId, String)>,
}

impl CascadeResult {
    /// Create an empty cascade result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of affected records.
    pub fn affected_count(&self) -> usize {
        self.deleted_entities.len() + self.nullified_fields.len()
    }

    /// Number of cascaded deletes per entity type.
    pub fn deleted_by_entity(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (entity, _) in &self.deleted_entities {
            *counts.entry(entity.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Executes cascade operations for delete.
pub struct CascadeExecutor<'a> {
    validator: &'a ConstraintValidator<'a>,
    engine: &'a StorageEngine,
}

impl<'a> CascadeExecutor<'a> {
    /// Create a new cascade executor.
    pub fn new(validator: &'a ConstraintValidator<'a>, engine: &'a StorageEngine) -> Self {
        Self { validator, engine }
    }

    /// Queue the effects of deleting `entity_id` on records that reference it.
    ///
    /// The record itself is not deleted here.
    pub fn process_delete(
        &self,
        entity: &str,
        entity_id: EntityId,
        tx: &mut Transaction<'_>,
    ) -> Result<CascadeResult, Error> {
        let mut result = CascadeResult::new();
        let mut visited = HashSet::from([entity_id]);

        self.process_delete_recursive(entity, entity_id, tx, &mut result, &mut visited, 0)?;

        if !result.deleted_entities.is_empty() {
            tracing::debug!(
                entity,
                id = %hex::encode(entity_id),
                deleted = result.deleted_entities.len(),
                nullified = result.nullified_fields.len(),
                "cascaded delete"
            );
        }

        Ok(result)
    }

    fn process_delete_recursive(
        &self,
        entity: &str,
        entity_id: EntityId,
        tx: &mut Transaction<'_>,
        result: &mut CascadeResult,
        visited: &mut HashSet<EntityId>,
        depth: usize,
    ) -> Result<(), Error> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(CascadeError::MaxDepthExceeded { depth }.into());
        }

        for relation in self.validator.schema().relations_to(entity) {
            let referencing: Vec<EntityId> = self
                .validator
                .find_referencing(&relation.from_entity, &relation.from_field, entity_id)?
                .into_iter()
                .filter(|id| !visited.contains(id) && !tx.is_deleting(id))
                .collect();

            if referencing.is_empty() {
                continue;
            }

            match relation.on_delete {
                DeleteBehavior::Restrict => {
                    return Err(CascadeError::RestrictViolation {
                        entity: entity.to_string(),
                        referencing_entity: relation.from_entity.clone(),
                        count: referencing.len(),
                    }
                    .into());
                }
                DeleteBehavior::Cascade => {
                    for ref_id in referencing {
                        // A record reachable over two relations is deleted once.
                        if !visited.insert(ref_id) {
                            continue;
                        }

                        self.process_delete_recursive(
                            &relation.from_entity,
                            ref_id,
                            tx,
                            result,
                            visited,
                            depth + 1,
                        )?;

                        if let Some(fields) = self.load(&ref_id)? {
                            self.validator
                                .release_unique(tx, &relation.from_entity, &fields);
                        }
                        tx.delete_typed(relation.from_entity.as_str(), ref_id);
                        result
                            .deleted_entities
                            .push((relation.from_entity.clone(), ref_id));
                    }
                }
                DeleteBehavior::SetNull => {
                    for ref_id in referencing {
                        self.set_field_null(
                            tx,
                            &relation.from_entity,
                            ref_id,
                            &relation.from_field,
                        )?;
                        result.nullified_fields.push((
                            relation.from_entity.clone(),
                            ref_id,
                            relation.from_field.clone(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    fn load(&self, entity_id: &EntityId) -> Result<Option<Vec<(String, Value)>>, Error> {
        match self.engine.get_latest(entity_id)? {
            Some((_, record)) => Ok(Some(decode_entity(&record.data)?)),
            None => Ok(None),
        }
    }

    fn set_field_null(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        entity_id: EntityId,
        field: &str,
    ) -> Result<(), Error> {
        let Some(before) = self.load(&entity_id)? else {
            return Ok(());
        };

        let mut after = before.clone();
        match after.iter_mut().find(|(name, _)| name == field) {
            Some(slot) => slot.1 = Value::Null,
            None => after.push((field.to_string(), Value::Null)),
        }

        self.validator
            .check_update(tx, entity, entity_id, &before, &after)?;
        tx.insert(entity, entity_id, Record::new(encode_entity(&after)?));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        ConstraintDef, EntityDef, FieldDef, FieldType, RelationDef, ScalarType, SchemaBundle,
    };
    use crate::constraint::UniqueIndex;
    use crate::storage::StorageConfig;

    fn schema(on_delete: DeleteBehavior) -> SchemaBundle {
        let user = EntityDef::new("User", "id")
            .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Uuid)));
        let seller = EntityDef::new("Seller", "id")
            .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Uuid)))
            .with_field(FieldDef::optional_scalar("user_id", ScalarType::Uuid));
        let product = EntityDef::new("Product", "id")
            .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Uuid)))
            .with_field(FieldDef::new("seller_id", FieldType::scalar(ScalarType::Uuid)));

        SchemaBundle::new(1)
            .with_entity(user)
            .with_entity(seller)
            .with_entity(product)
            .with_relation(
                RelationDef::one_to_one("seller_user", "Seller", "user_id", "User", "id")
                    .with_on_delete(on_delete),
            )
            .with_relation(
                RelationDef::one_to_many("product_seller", "Product", "seller_id", "Seller", "id")
                    .cascade(),
            )
            .with_constraint(ConstraintDef::unique("seller_user_unique", "Seller", "user_id"))
    }

    fn put(engine: &StorageEngine, entity: &str, fields: &[(&str, EntityId)]) -> EntityId {
        let id = StorageEngine::generate_id();
        let mut data = vec![("id".to_string(), Value::Uuid(id))];
        data.extend(fields.iter().map(|(f, v)| (f.to_string(), Value::Uuid(*v))));

        let mut tx = engine.transaction();
        tx.insert(entity, id, Record::new(encode_entity(&data).unwrap()));
        tx.commit().unwrap();
        id
    }

    struct Graph {
        user: EntityId,
        seller: EntityId,
        products: Vec<EntityId>,
    }

    fn graph(engine: &StorageEngine) -> Graph {
        let user = put(engine, "User", &[]);
        let seller = put(engine, "Seller", &[("user_id", user)]);
        let products = (0..3)
            .map(|_| put(engine, "Product", &[("seller_id", seller)]))
            .collect();
        Graph {
            user,
            seller,
            products,
        }
    }

    #[test]
    fn test_cascade_is_transitive() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let index = UniqueIndex::open(&engine);
        let schema = schema(DeleteBehavior::Cascade);
        let validator = ConstraintValidator::new(&schema, &engine, &index);
        let g = graph(&engine);

        let mut tx = engine.transaction();
        let result = CascadeExecutor::new(&validator, &engine)
            .process_delete("User", g.user, &mut tx)
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(result.deleted_entities.len(), 4);
        let counts = result.deleted_by_entity();
        assert_eq!(counts.get("Seller"), Some(&1));
        assert_eq!(counts.get("Product"), Some(&3));

        assert!(!engine.contains_typed("Seller", &g.seller).unwrap());
        for product in g.products {
            assert!(!engine.contains_typed("Product", &product).unwrap());
        }
        // The root is left to the caller.
        assert!(engine.contains_typed("User", &g.user).unwrap());
    }

    #[test]
    fn test_restrict_prevents_delete() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let index = UniqueIndex::open(&engine);
        let schema = schema(DeleteBehavior::Restrict);
        let validator = ConstraintValidator::new(&schema, &engine, &index);
        let g = graph(&engine);

        let mut tx = engine.transaction();
        let err = CascadeExecutor::new(&validator, &engine)
            .process_delete("User", g.user, &mut tx)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Cascade(CascadeError::RestrictViolation { count: 1, .. })
        ));
    }

    #[test]
    fn test_set_null() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let index = UniqueIndex::open(&engine);
        let schema = schema(DeleteBehavior::SetNull);
        let validator = ConstraintValidator::new(&schema, &engine, &index);
        let g = graph(&engine);

        let mut tx = engine.transaction();
        let result = CascadeExecutor::new(&validator, &engine)
            .process_delete("User", g.user, &mut tx)
            .unwrap();
        tx.commit().unwrap();

        assert!(result.deleted_entities.is_empty());
        assert_eq!(result.nullified_fields.len(), 1);

        let (_, record) = engine.get_typed("Seller", &g.seller).unwrap().unwrap();
        assert_eq!(
            crate::codec::get_field(&record.data, "user_id").unwrap(),
            Some(Value::Null)
        );
    }

    #[test]
    fn test_no_references() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let index = UniqueIndex::open(&engine);
        let schema = schema(DeleteBehavior::Cascade);
        let validator = ConstraintValidator::new(&schema, &engine, &index);
        let lonely = put(&engine, "User", &[]);

        let mut tx = engine.transaction();
        let result = CascadeExecutor::new(&validator, &engine)
            .process_delete("User", lonely, &mut tx)
            .unwrap();

        assert_eq!(result.affected_count(), 0);
        assert_eq!(tx.operation_count(), 0);
    }
}
