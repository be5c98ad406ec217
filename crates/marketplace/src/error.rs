//! Marketplace error types.

use marketplace_core::error::{ConstraintError, Error as CoreError, ValidationError};
use thiserror::Error;

use crate::models::Role;

/// Errors returned by the marketplace client and repositories.
#[derive(Debug, Error)]
pub enum Error {
    /// A unique field already holds the value.
    #[error("{entity}.{field} '{value}' is already taken")]
    UniqueViolation {
        /// Entity the constraint belongs to.
        entity: String,
        /// Field (or comma separated fields) covered by the constraint.
        field: String,
        /// The clashing value.
        value: String,
    },

    /// A relation was connected to a record that does not exist.
    #[error("relation '{relation}': no {entity} record with id {id}")]
    RelationNotFound {
        /// Relation name.
        relation: String,
        /// Entity the id was expected to resolve to.
        entity: String,
        /// The unresolved id.
        id: String,
    },

    /// The write did not match the schema.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The nested profile does not match the user's role.
    #[error("a {role} user {reason}")]
    ProfileMismatch {
        /// Role of the user being created.
        role: Role,
        /// What is wrong with the supplied profiles.
        reason: &'static str,
    },

    /// Password below the minimum length.
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum length in characters.
        min: usize,
    },

    /// A caller-side input rule was broken.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Offending input field.
        field: &'static str,
        /// Description of the rule.
        reason: String,
    },

    /// Malformed record id.
    #[error("invalid id '{0}': expected 32 hex characters")]
    InvalidId(String),

    /// Record not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity type.
        entity: String,
        /// Hex-encoded id.
        id: String,
    },

    /// Any other engine error.
    #[error(transparent)]
    Core(CoreError),
}

impl Error {
    /// Check if the error is a unique or foreign key violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::UniqueViolation { .. } | Error::RelationNotFound { .. }
        )
    }

    /// Check if the error means a record could not be resolved.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::RelationNotFound { .. })
    }

    /// Check if the error was raised before anything reached storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::ProfileMismatch { .. }
                | Error::PasswordTooShort { .. }
                | Error::InvalidInput { .. }
                | Error::InvalidId(_)
        )
    }
}

impl From<CoreError> for Error {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::ConstraintViolation(ConstraintError::UniqueViolation {
                entity,
                fields,
                value,
                ..
            }) => Error::UniqueViolation {
                entity,
                field: fields.join(","),
                value,
            },
            CoreError::ConstraintViolation(ConstraintError::ForeignKeyViolation {
                constraint,
                referenced_entity,
                value,
                ..
            }) => Error::RelationNotFound {
                relation: constraint,
                entity: referenced_entity,
                id: value,
            },
            CoreError::Validation(e) => Error::Validation(e),
            CoreError::NotFound { entity, id } => Error::NotFound { entity, id },
            other => Error::Core(other),
        }
    }
}

/// Result alias for marketplace operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_names_the_field() {
        let core = CoreError::ConstraintViolation(ConstraintError::UniqueViolation {
            constraint: "user_email_unique".into(),
            entity: "User".into(),
            fields: vec!["email".into()],
            value: "a@x.io".into(),
        });

        let err = Error::from(core);
        assert!(err.is_constraint_violation());
        assert!(matches!(err, Error::UniqueViolation { ref field, .. } if field == "email"));
        assert_eq!(err.to_string(), "User.email 'a@x.io' is already taken");
    }

    #[test]
    fn test_foreign_key_maps_to_relation_not_found() {
        let core = CoreError::ConstraintViolation(ConstraintError::ForeignKeyViolation {
            constraint: "product_seller".into(),
            entity: "Product".into(),
            field: "seller_id".into(),
            referenced_entity: "Seller".into(),
            value: "00".repeat(16),
        });

        let err = Error::from(core);
        assert!(err.is_not_found());
        assert!(err.is_constraint_violation());
        assert!(matches!(err, Error::RelationNotFound { ref entity, .. } if entity == "Seller"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = Error::from(CoreError::NoSchema);
        assert!(matches!(err, Error::Core(CoreError::NoSchema)));
        assert!(!err.is_validation());

        let err = Error::from(CoreError::Validation(ValidationError::MissingField {
            entity: "User".into(),
            field: "role".into(),
        }));
        assert!(err.is_validation());
    }
}
