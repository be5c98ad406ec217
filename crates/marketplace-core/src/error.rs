//! Core error types.

use thiserror::Error;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found.
    #[error("{entity} record {id} not found")]
    NotFound {
        /// Entity type that was looked up.
        entity: String,
        /// Hex-encoded identifier.
        id: String,
    },

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// No schema has been applied to the catalog.
    #[error("no schema applied")]
    NoSchema,

    /// A constraint was violated by a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] ConstraintError),

    /// A write did not match the entity definition.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A delete could not be cascaded.
    #[error("cascade failed: {0}")]
    Cascade(#[from] CascadeError),
}

/// Violations of declared schema constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    /// Another record already holds the value.
    #[error("unique constraint '{constraint}' on {entity}({}) violated by value '{value}'", fields.join(", "))]
    UniqueViolation {
        /// Constraint name.
        constraint: String,
        /// Entity the constraint belongs to.
        entity: String,
        /// Fields covered by the constraint.
        fields: Vec<String>,
        /// The clashing value(s), comma separated.
        value: String,
    },

    /// A foreign key did not resolve to a live record of the referenced type.
    #[error("foreign key '{constraint}' on {entity}.{field}: no {referenced_entity} record with id {value}")]
    ForeignKeyViolation {
        /// Constraint name.
        constraint: String,
        /// Entity holding the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Entity the key must resolve to.
        referenced_entity: String,
        /// The unresolved value.
        value: String,
    },

    /// A delete is blocked by referencing records.
    #[error("delete of {entity} restricted by '{constraint}': {count} {referencing_entity} record(s) reference it")]
    RestrictViolation {
        /// Relation name.
        constraint: String,
        /// Entity being deleted.
        entity: String,
        /// Entity holding the references.
        referencing_entity: String,
        /// Number of referencing records.
        count: usize,
    },
}

/// Mismatches between written data and the entity definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Entity is not part of the schema.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// Field is not declared on the entity.
    #[error("unknown field {entity}.{field}")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// Required field absent or null.
    #[error("missing required field {entity}.{field}")]
    MissingField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// Value type does not match the declared field type.
    #[error("field {entity}.{field} expects {expected}, got {actual}")]
    TypeMismatch {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Declared type.
        expected: String,
        /// Type of the supplied value.
        actual: String,
    },

    /// Value is not one of the enum's variants.
    #[error("invalid value '{value}' for {entity}.{field}, expected one of: {}", allowed.join(", "))]
    InvalidEnumValue {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Supplied value.
        value: String,
        /// Declared variants.
        allowed: Vec<String>,
    },

    /// The identity field cannot be written directly.
    #[error("identity field {entity}.{field} is read-only")]
    ReadOnlyField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },
}

/// Errors raised while walking relations on delete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// Relation graph deeper than the configured limit.
    #[error("cascade exceeded maximum depth {depth}")]
    MaxDepthExceeded {
        /// Depth reached.
        depth: usize,
    },

    /// A restrict relation blocked the cascade.
    #[error("cannot delete {entity}: {count} {referencing_entity} record(s) still reference it")]
    RestrictViolation {
        /// Entity being deleted.
        entity: String,
        /// Entity holding the references.
        referencing_entity: String,
        /// Number of referencing records.
        count: usize,
    },
}

impl Error {
    /// Build a not-found error for an entity id.
    pub fn not_found(entity: &str, id: &[u8; 16]) -> Self {
        Error::NotFound {
            entity: entity.to_string(),
            id: hex::encode(id),
        }
    }
}
