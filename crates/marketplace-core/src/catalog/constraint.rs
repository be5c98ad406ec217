//! Constraint definitions for entities.

use rkyv::{Archive, Deserialize, Serialize};

/// A constraint definition.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ConstraintDef {
    /// Uniqueness constraint (single or composite).
    Unique {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Fields that must be unique together.
        fields: Vec<String>,
    },
    /// Foreign key constraint.
    ForeignKey {
        /// Constraint name.
        name: String,
        /// Entity containing the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Referenced entity.
        references_entity: String,
        /// Referenced field (usually identity).
        references_field: String,
    },
}

impl ConstraintDef {
    /// Create a unique constraint on a single field.
    pub fn unique(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: vec![field.into()],
        }
    }

    /// Create a composite unique constraint.
    pub fn unique_composite(
        name: impl Into<String>,
        entity: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a foreign key constraint.
    pub fn foreign_key(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
        references_entity: impl Into<String>,
        references_field: impl Into<String>,
    ) -> Self {
        ConstraintDef::ForeignKey {
            name: name.into(),
            entity: entity.into(),
            field: field.into(),
            references_entity: references_entity.into(),
            references_field: references_field.into(),
        }
    }

    /// Get the constraint name.
    pub fn name(&self) -> &str {
        match self {
            ConstraintDef::Unique { name, .. } | ConstraintDef::ForeignKey { name, .. } => name,
        }
    }

    /// Get the entity this constraint applies to.
    pub fn entity(&self) -> &str {
        match self {
            ConstraintDef::Unique { entity, .. } | ConstraintDef::ForeignKey { entity, .. } => {
                entity
            }
        }
    }

    /// Check if this is a unique constraint.
    pub fn is_unique(&self) -> bool {
        matches!(self, ConstraintDef::Unique { .. })
    }

    /// Check if this is a foreign key constraint.
    pub fn is_foreign_key(&self) -> bool {
        matches!(self, ConstraintDef::ForeignKey { .. })
    }

    /// Check if this is a unique constraint over exactly `field`.
    pub fn is_unique_on(&self, field: &str) -> bool {
        match self {
            ConstraintDef::Unique { fields, .. } => fields.len() == 1 && fields[0] == field,
            _ => false,
        }
    }
}
