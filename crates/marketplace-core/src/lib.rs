//! Marketplace Core - schema-driven storage with constraint enforcement.
//!
//! This crate provides the generic engine underneath the marketplace data layer:
//! a persisted catalog, a versioned record store, unique and foreign key
//! enforcement, and cascading deletes.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod cascade;
pub mod catalog;
pub mod codec;
pub mod constraint;
pub mod database;
pub mod decimal;
pub mod error;
pub mod lookup;
pub mod mutation;
pub mod storage;
pub mod value;

pub use cascade::{CascadeExecutor, CascadeResult};
pub use catalog::{
    Cardinality, Catalog, ConstraintDef, DefaultValue, DeleteBehavior, EntityDef, FieldDef,
    FieldType, RelationDef, ScalarType, SchemaBundle,
};
pub use codec::{decode_entity, encode_entity, get_field};
pub use constraint::{ConstraintValidator, UniqueIndex};
pub use database::Database;
pub use decimal::{Decimal, DecimalError};
pub use error::{CascadeError, ConstraintError, Error, ValidationError};
pub use lookup::{Lookup, Row};
pub use mutation::{DeleteOutcome, MutationExecutor, NewRecord};
pub use storage::{EntityId, Record, StorageConfig, StorageEngine, Transaction, VersionedKey};
pub use value::Value;
