//! Constraint validation logic.
//!
//! The ConstraintValidator normalizes incoming field lists against the entity
//! definition and checks the schema's constraints for inserts, updates and
//! deletes. Index changes are queued on the caller's transaction.

use crate::catalog::{
    ConstraintDef, DefaultValue, DeleteBehavior, EntityDef, FieldDef, FieldType, ScalarType,
    SchemaBundle,
};
use crate::codec::get_field;
use crate::error::{ConstraintError, Error, ValidationError};
use crate::storage::{key::current_timestamp, EntityId, StorageEngine, Transaction};
use crate::value::Value;

use super::unique_index::UniqueIndex;

/// Constraint validator for enforcing schema rules.
pub struct ConstraintValidator<'a> {
    schema: &'a SchemaBundle,
    engine: &'a StorageEngine,
    unique_index: &'a UniqueIndex,
}

impl<'a> ConstraintValidator<'a> {
    /// Create a new constraint validator.
    pub fn new(
        schema: &'a SchemaBundle,
        engine: &'a StorageEngine,
        unique_index: &'a UniqueIndex,
    ) -> Self {
        Self {
            schema,
            engine,
            unique_index,
        }
    }

    /// The schema being enforced.
    pub fn schema(&self) -> &'a SchemaBundle {
        self.schema
    }

    /// Look up an entity definition.
    pub fn entity(&self, name: &str) -> Result<&'a EntityDef, Error> {
        self.schema
            .get_entity(name)
            .ok_or_else(|| ValidationError::UnknownEntity(name.to_string()).into())
    }

    /// Build the full record for an insert.
    ///
    /// Rejects unknown fields and writes to the identity field, fills defaults,
    /// checks required fields, types and enum members. The result is in
    /// declaration order with the identity field set to `entity_id`.
    pub fn prepare_insert(
        &self,
        entity: &str,
        entity_id: EntityId,
        mut fields: Vec<(String, Value)>,
    ) -> Result<Vec<(String, Value)>, Error> {
        let def = self.entity(entity)?;
        self.reject_undeclared(def, &fields)?;

        let mut record = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            if def.is_identity(&field.name) {
                record.push((field.name.clone(), Value::Uuid(entity_id)));
                continue;
            }

            let supplied = fields
                .iter()
                .position(|(name, _)| name == &field.name)
                .map(|pos| fields.swap_remove(pos).1);

            let value = match (supplied, &field.default) {
                (Some(value), _) => value,
                (None, Some(default)) => default_value(field, default),
                (None, None) => Value::Null,
            };

            record.push((field.name.clone(), normalize(def, field, value)?));
        }

        Ok(record)
    }

    /// Merge `changes` into `current` and check the result.
    pub fn prepare_update(
        &self,
        entity: &str,
        mut current: Vec<(String, Value)>,
        changes: Vec<(String, Value)>,
    ) -> Result<Vec<(String, Value)>, Error> {
        let def = self.entity(entity)?;
        self.reject_undeclared(def, &changes)?;

        for (name, value) in changes {
            let Some(field) = def.get_field(&name) else {
                continue;
            };
            let value = normalize(def, field, value)?;
            match current.iter_mut().find(|(n, _)| n == &name) {
                Some(slot) => slot.1 = value,
                None => current.push((name, value)),
            }
        }

        Ok(current)
    }

    /// Check unique and foreign key constraints for a new record.
    pub fn check_insert(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        entity_id: EntityId,
        record: &[(String, Value)],
    ) -> Result<(), Error> {
        for constraint in self.schema.constraints_for(entity) {
            match constraint {
                ConstraintDef::Unique { name, fields, .. } => {
                    if let Some(values) = unique_values(fields, record) {
                        self.unique_index
                            .claim(tx, entity, name, fields, &values, entity_id)?;
                    }
                }
                ConstraintDef::ForeignKey { .. } => {
                    self.check_foreign_key(tx, constraint, record)?;
                }
            }
        }
        Ok(())
    }

    /// Check constraints for an update, moving unique claims that changed.
    pub fn check_update(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        entity_id: EntityId,
        before: &[(String, Value)],
        after: &[(String, Value)],
    ) -> Result<(), Error> {
        for constraint in self.schema.constraints_for(entity) {
            match constraint {
                ConstraintDef::Unique { name, fields, .. } => {
                    let old = unique_values(fields, before);
                    let new = unique_values(fields, after);
                    if old == new {
                        continue;
                    }
                    if let Some(old) = old {
                        self.unique_index.release(tx, entity, name, &old);
                    }
                    if let Some(new) = new {
                        self.unique_index
                            .claim(tx, entity, name, fields, &new, entity_id)?;
                    }
                }
                ConstraintDef::ForeignKey { field, .. } => {
                    if field_value(before, field) != field_value(after, field) {
                        self.check_foreign_key(tx, constraint, after)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Check that no `Restrict` relation blocks deleting the record.
    ///
    /// Cascade and SetNull relations are left to the cascade executor.
    pub fn validate_delete(
        &self,
        tx: &Transaction<'_>,
        entity: &str,
        entity_id: EntityId,
    ) -> Result<(), Error> {
        for relation in self.schema.relations_to(entity) {
            if relation.on_delete != DeleteBehavior::Restrict {
                continue;
            }

            let count = self
                .find_referencing(&relation.from_entity, &relation.from_field, entity_id)?
                .into_iter()
                .filter(|id| !tx.is_deleting(id))
                .count();

            if count > 0 {
                return Err(ConstraintError::RestrictViolation {
                    constraint: relation.name.clone(),
                    entity: entity.to_string(),
                    referencing_entity: relation.from_entity.clone(),
                    count,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Queue the release of every unique value held by `record`.
    pub fn release_unique(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        record: &[(String, Value)],
    ) {
        for constraint in self.schema.constraints_for(entity) {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                if let Some(values) = unique_values(fields, record) {
                    self.unique_index.release(tx, entity, name, &values);
                }
            }
        }
    }

    /// Ids of live `from_entity` records whose `from_field` points at `target_id`.
    pub fn find_referencing(
        &self,
        from_entity: &str,
        from_field: &str,
        target_id: EntityId,
    ) -> Result<Vec<EntityId>, Error> {
        let mut referencing = Vec::new();
        for result in self.engine.scan_entity_type(from_entity) {
            let (id, _, record) = result?;
            if let Some(Value::Uuid(value)) = get_field(&record.data, from_field)? {
                if value == target_id {
                    referencing.push(id);
                }
            }
        }
        Ok(referencing)
    }

    fn check_foreign_key(
        &self,
        tx: &Transaction<'_>,
        constraint: &ConstraintDef,
        record: &[(String, Value)],
    ) -> Result<(), Error> {
        let ConstraintDef::ForeignKey {
            name,
            entity,
            field,
            references_entity,
            ..
        } = constraint
        else {
            return Ok(());
        };

        let resolved = match field_value(record, field) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Uuid(id)) => tx.exists_typed(references_entity, id)?,
            Some(_) => false,
        };

        if resolved {
            return Ok(());
        }

        Err(ConstraintError::ForeignKeyViolation {
            constraint: name.clone(),
            entity: entity.clone(),
            field: field.clone(),
            referenced_entity: references_entity.clone(),
            value: field_value(record, field)
                .map(Value::index_key)
                .unwrap_or_default(),
        }
        .into())
    }

    fn reject_undeclared(&self, def: &EntityDef, fields: &[(String, Value)]) -> Result<(), Error> {
        for (name, _) in fields {
            if def.is_identity(name) {
                return Err(ValidationError::ReadOnlyField {
                    entity: def.name.clone(),
                    field: name.clone(),
                }
                .into());
            }
            if def.get_field(name).is_none() {
                return Err(ValidationError::UnknownField {
                    entity: def.name.clone(),
                    field: name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Look up a field in a decoded record.
pub(crate) fn field_value<'r>(record: &'r [(String, Value)], name: &str) -> Option<&'r Value> {
    record.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// Index key components for a unique constraint, or `None` if any part is null.
fn unique_values(fields: &[String], record: &[(String, Value)]) -> Option<Vec<String>> {
    fields
        .iter()
        .map(|f| match field_value(record, f) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.index_key()),
        })
        .collect()
}

fn default_value(field: &FieldDef, default: &DefaultValue) -> Value {
    match default {
        DefaultValue::Null => Value::Null,
        DefaultValue::Bool(b) => Value::Bool(*b),
        DefaultValue::Int(i) => match field.field_type.scalar_type() {
            Some(ScalarType::Int32) => i32::try_from(*i)
                .map(Value::Int32)
                .unwrap_or(Value::Int64(*i)),
            _ => Value::Int64(*i),
        },
        DefaultValue::String(s) => Value::String(s.clone()),
        DefaultValue::CurrentTimestamp => Value::Timestamp(current_timestamp() as i64),
    }
}

/// Check a single value against its field definition.
fn normalize(def: &EntityDef, field: &FieldDef, value: Value) -> Result<Value, Error> {
    if value.is_null() {
        if field.required {
            return Err(ValidationError::MissingField {
                entity: def.name.clone(),
                field: field.name.clone(),
            }
            .into());
        }
        return Ok(Value::Null);
    }

    let mismatch = |actual: String| -> Error {
        ValidationError::TypeMismatch {
            entity: def.name.clone(),
            field: field.name.clone(),
            expected: field.field_type.to_string(),
            actual,
        }
        .into()
    };

    if !value.conforms_to(&field.field_type) {
        return Err(mismatch(value.type_name().to_string()));
    }

    match (&field.field_type, value) {
        (
            FieldType::Enum { variants, .. } | FieldType::OptionalEnum { variants, .. },
            Value::String(s),
        ) => {
            if variants.iter().any(|v| v == &s) {
                Ok(Value::String(s))
            } else {
                Err(ValidationError::InvalidEnumValue {
                    entity: def.name.clone(),
                    field: field.name.clone(),
                    value: s,
                    allowed: variants.clone(),
                }
                .into())
            }
        }
        (
            FieldType::Scalar(ScalarType::Decimal { precision, scale })
            | FieldType::OptionalScalar(ScalarType::Decimal { precision, scale }),
            Value::Decimal(d),
        ) => d
            .fit(*precision, *scale)
            .map(Value::Decimal)
            .map_err(|e| mismatch(format!("decimal {d} ({e})"))),
        (
            FieldType::Scalar(ScalarType::Int64) | FieldType::OptionalScalar(ScalarType::Int64),
            Value::Int32(i),
        ) => Ok(Value::Int64(i64::from(i))),
        (_, value) => Ok(value),
    }
}
