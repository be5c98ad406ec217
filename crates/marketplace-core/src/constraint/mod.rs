//! Constraint enforcement.
//!
//! - Field shape: unknown fields, required fields, scalar types, enum members
//! - Unique constraints (single and composite)
//! - Foreign keys resolved against live records of the referenced type
//! - Restrict checks on delete

mod unique_index;
mod validator;

pub use unique_index::UniqueIndex;
pub use validator::ConstraintValidator;
