//! Read-side access to stored records.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::codec::decode_entity;
use crate::database::Database;
use crate::error::Error;
use crate::storage::EntityId;
use crate::value::Value;

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Entity type.
    pub entity: String,
    /// Record id.
    pub id: EntityId,
    /// Field values in declaration order.
    pub fields: Vec<(String, Value)>,
}

impl Row {
    /// Create a row.
    pub fn new(entity: impl Into<String>, id: EntityId, fields: Vec<(String, Value)>) -> Self {
        Self {
            entity: entity.into(),
            id,
            fields,
        }
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a string field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Get a uuid field.
    pub fn get_uuid(&self, name: &str) -> Option<EntityId> {
        self.get(name).and_then(Value::as_uuid).copied()
    }

    /// The `created_at` timestamp, if the entity has one.
    pub fn created_at(&self) -> Option<i64> {
        self.get("created_at").and_then(Value::as_timestamp)
    }

    /// Hex form of the id.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Read-only queries against a [`Database`].
pub struct Lookup<'a> {
    database: &'a Database,
}

impl<'a> Lookup<'a> {
    /// Create a lookup over `database`.
    pub fn new(database: &'a Database) -> Self {
        Self { database }
    }

    /// Get a live record of `entity` by id.
    ///
    /// Ids belonging to another entity type do not resolve.
    pub fn get(&self, entity: &str, id: &EntityId) -> Result<Option<Row>, Error> {
        self.database.entity(entity)?;
        match self.database.storage().get_typed(entity, id)? {
            Some((_, record)) => Ok(Some(Row::new(entity, *id, decode_entity(&record.data)?))),
            None => Ok(None),
        }
    }

    /// Find the record holding `value` in a field.
    ///
    /// Uses the unique index when a single-field unique constraint covers the
    /// field, otherwise scans.
    pub fn find_unique(
        &self,
        entity: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Row>, Error> {
        let schema = self.database.schema()?;
        let Some(constraint) = schema.unique_constraint_on(entity, field) else {
            return Ok(self.filter_eq(entity, field, value)?.into_iter().next());
        };

        if value.is_null() {
            return Ok(None);
        }

        let owner = self.database.unique_index().lookup(
            entity,
            constraint.name(),
            &[value.index_key()],
        )?;
        match owner {
            Some(id) => self.get(entity, &id),
            None => Ok(None),
        }
    }

    /// All live records of `entity`, oldest first.
    pub fn scan(&self, entity: &str) -> Result<Vec<Row>, Error> {
        self.database.entity(entity)?;
        let mut rows = Vec::new();
        for result in self.database.storage().scan_entity_type(entity) {
            let (id, _, record) = result?;
            rows.push(Row::new(entity, id, decode_entity(&record.data)?));
        }
        rows.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    /// Live records of `entity` whose `field` equals `value`, oldest first.
    pub fn filter_eq(&self, entity: &str, field: &str, value: &Value) -> Result<Vec<Row>, Error> {
        let mut rows = self.scan(entity)?;
        rows.retain(|row| row.get(field) == Some(value));
        Ok(rows)
    }

    /// Number of live records of `entity`.
    pub fn count(&self, entity: &str) -> Result<usize, Error> {
        self.database.entity(entity)?;
        Ok(self.database.storage().count_entity_type(entity))
    }
}

