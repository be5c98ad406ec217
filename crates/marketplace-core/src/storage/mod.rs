//! Storage layer.
//!
//! A sled-based record store. Every write produces a new version of the
//! record; deletes write tombstones.

mod config;
mod engine;
mod record;
mod transaction;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use key::VersionedKey;
pub use record::Record;
pub use transaction::{Transaction, TransactionOp};

/// Identifier of a stored record.
pub type EntityId = [u8; key::ENTITY_ID_SIZE];
