//! Schema catalog.
//!
//! The catalog stores the entity, relation and constraint definitions the
//! engine enforces, persisted alongside the data.

mod catalog;
mod constraint;
mod entity;
mod field;
mod relation;
mod schema;
mod types;

pub use catalog::Catalog;
pub use constraint::ConstraintDef;
pub use entity::EntityDef;
pub use field::{DefaultValue, FieldDef};
pub use relation::{Cardinality, DeleteBehavior, RelationDef};
pub use schema::SchemaBundle;
pub use types::{FieldType, ScalarType};
