//! Transaction support for atomic multi-key operations.

use std::collections::HashMap;

use super::engine::{latest_key, type_index_key};
use super::{EntityId, Record, StorageEngine, VersionedKey};
use crate::error::Error;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::Transactional;

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    /// Write a new version of a typed record.
    Put {
        /// Entity type name.
        entity_type: String,
        /// Versioned key.
        key: VersionedKey,
        /// Record data.
        record: Record,
    },
    /// Tombstone a record and drop it from the type index.
    Delete {
        /// Entity type name.
        entity_type: String,
        /// Entity ID to delete.
        entity_id: EntityId,
    },
    /// Point a unique index key at an entity.
    ClaimUnique {
        /// Encoded unique index key.
        key: Vec<u8>,
        /// Owning entity.
        entity_id: EntityId,
    },
    /// Remove a unique index key.
    ReleaseUnique {
        /// Encoded unique index key.
        key: Vec<u8>,
    },
}

/// A transaction for atomic multi-key operations.
///
/// Operations are collected and applied in a single sled transaction over the
/// data, meta, type index and unique index trees. Reads through the
/// transaction see its own pending writes.
pub struct Transaction<'a> {
    engine: &'a StorageEngine,
    ops: Vec<TransactionOp>,
    /// Pending record state: `Some(type)` when written, `None` when deleted.
    write_cache: HashMap<EntityId, Option<String>>,
    /// Pending unique index state: `Some(owner)` when claimed, `None` when released.
    unique_cache: HashMap<Vec<u8>, Option<EntityId>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(engine: &'a StorageEngine) -> Self {
        Self {
            engine,
            ops: Vec::new(),
            write_cache: HashMap::new(),
            unique_cache: HashMap::new(),
        }
    }

    /// The engine this transaction commits to.
    pub fn engine(&self) -> &'a StorageEngine {
        self.engine
    }

    /// Queue a typed put operation.
    pub fn put_typed(
        &mut self,
        entity_type: impl Into<String>,
        key: VersionedKey,
        record: Record,
    ) -> &mut Self {
        let entity_type = entity_type.into();
        self.write_cache
            .insert(key.entity_id, Some(entity_type.clone()));
        self.ops.push(TransactionOp::Put {
            entity_type,
            key,
            record,
        });
        self
    }

    /// Queue a write of `record` as the next version of `entity_id`.
    pub fn insert(
        &mut self,
        entity_type: impl Into<String>,
        entity_id: EntityId,
        record: Record,
    ) -> &mut Self {
        self.put_typed(entity_type, VersionedKey::now(entity_id), record)
    }

    /// Queue a typed delete operation.
    pub fn delete_typed(
        &mut self,
        entity_type: impl Into<String>,
        entity_id: EntityId,
    ) -> &mut Self {
        self.write_cache.insert(entity_id, None);
        self.ops.push(TransactionOp::Delete {
            entity_type: entity_type.into(),
            entity_id,
        });
        self
    }

    /// Queue a unique index claim.
    pub fn claim_unique(&mut self, key: Vec<u8>, entity_id: EntityId) -> &mut Self {
        self.unique_cache.insert(key.clone(), Some(entity_id));
        self.ops.push(TransactionOp::ClaimUnique { key, entity_id });
        self
    }

    /// Queue a unique index release.
    pub fn release_unique(&mut self, key: Vec<u8>) -> &mut Self {
        self.unique_cache.insert(key.clone(), None);
        self.ops.push(TransactionOp::ReleaseUnique { key });
        self
    }

    /// Check whether a live entity of `entity_type` exists, counting pending writes.
    pub fn exists_typed(&self, entity_type: &str, entity_id: &EntityId) -> Result<bool, Error> {
        if let Some(cached) = self.write_cache.get(entity_id) {
            return Ok(cached.as_deref() == Some(entity_type));
        }
        self.engine.contains_typed(entity_type, entity_id)
    }

    /// Check if an entity is deleted by this transaction.
    pub fn is_deleting(&self, entity_id: &EntityId) -> bool {
        matches!(self.write_cache.get(entity_id), Some(None))
    }

    /// Current owner of a unique index key, counting pending claims and releases.
    pub fn unique_owner(&self, key: &[u8]) -> Result<Option<EntityId>, Error> {
        if let Some(cached) = self.unique_cache.get(key) {
            return Ok(*cached);
        }
        match self.engine.unique_tree().get(key)? {
            Some(bytes) => {
                let id: EntityId = bytes.as_ref().try_into().map_err(|_| Error::InvalidKey)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Get the pending operations.
    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Commit the transaction atomically.
    ///
    /// All operations succeed or none do. Every record written or deleted
    /// keeps only its newest version: older versions are removed in the same
    /// sled transaction, and a delete leaves a bare tombstone.
    pub fn commit(self) -> Result<(), Error> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let superseded = self.superseded_versions()?;
        let trees = (
            self.engine.data_tree(),
            self.engine.meta_tree(),
            self.engine.type_index_tree(),
            self.engine.unique_tree(),
        );

        let result: Result<(), TransactionError<Error>> =
            trees.transaction(|(data_tx, meta_tx, type_tx, unique_tx)| {
                for key in &superseded {
                    data_tx.remove(key.as_slice())?;
                }

                // Versions written earlier in this transaction, per entity.
                let mut written: HashMap<EntityId, VersionedKey> = HashMap::new();

                for op in &self.ops {
                    match op {
                        TransactionOp::Put {
                            entity_type,
                            key,
                            record,
                        } => {
                            Self::execute_put(data_tx, meta_tx, key, record)?;
                            Self::drop_pending(data_tx, &mut written, *key)?;
                            type_tx.insert(type_index_key(entity_type, &key.entity_id), &[])?;
                        }
                        TransactionOp::Delete {
                            entity_type,
                            entity_id,
                        } => {
                            let key = VersionedKey::now(*entity_id);
                            Self::execute_put(data_tx, meta_tx, &key, &Record::tombstone())?;
                            Self::drop_pending(data_tx, &mut written, key)?;
                            type_tx.remove(type_index_key(entity_type, entity_id))?;
                        }
                        TransactionOp::ClaimUnique { key, entity_id } => {
                            unique_tx.insert(key.as_slice(), &entity_id[..])?;
                        }
                        TransactionOp::ReleaseUnique { key } => {
                            unique_tx.remove(key.as_slice())?;
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    /// Discard all pending operations.
    pub fn rollback(self) {
        drop(self.ops);
    }

    /// Stored version keys of every record this transaction writes or deletes.
    fn superseded_versions(&self) -> Result<Vec<Vec<u8>>, Error> {
        let data = self.engine.data_tree();
        let mut keys = Vec::new();

        for entity_id in self.write_cache.keys() {
            let min_key = VersionedKey::min_for_entity(*entity_id).encode();
            let max_key = VersionedKey::max_for_entity(*entity_id).encode();
            for entry in data.range(min_key..=max_key) {
                let (key, _) = entry?;
                keys.push(key.to_vec());
            }
        }

        Ok(keys)
    }

    /// Remove the version this transaction wrote earlier for the same entity.
    fn drop_pending(
        data_tx: &TransactionalTree,
        written: &mut HashMap<EntityId, VersionedKey>,
        key: VersionedKey,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        if let Some(previous) = written.insert(key.entity_id, key) {
            if previous.version_ts != key.version_ts {
                data_tx.remove(&previous.encode())?;
            }
        }
        Ok(())
    }

    fn execute_put(
        data_tx: &TransactionalTree,
        meta_tx: &TransactionalTree,
        key: &VersionedKey,
        record: &Record,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        let value_bytes = record
            .to_bytes()
            .map_err(ConflictableTransactionError::Abort)?;

        data_tx.insert(&key.encode(), value_bytes)?;
        meta_tx.insert(latest_key(&key.entity_id), &key.version_ts.to_be_bytes())?;

        Ok(())
    }
}

impl StorageEngine {
    /// Begin a new transaction.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    #[test]
    fn test_transaction_commit() {
        let engine = test_engine();
        let id1 = StorageEngine::generate_id();
        let id2 = StorageEngine::generate_id();

        let mut tx = engine.transaction();
        tx.insert("User", id1, Record::new(vec![1]))
            .insert("Client", id2, Record::new(vec![2]));
        assert_eq!(tx.operation_count(), 2);
        tx.commit().unwrap();

        assert!(engine.contains_typed("User", &id1).unwrap());
        assert!(engine.contains_typed("Client", &id2).unwrap());
    }

    #[test]
    fn test_rollback_writes_nothing() {
        let engine = test_engine();
        let id = StorageEngine::generate_id();

        let mut tx = engine.transaction();
        tx.insert("User", id, Record::new(vec![1]));
        tx.rollback();

        assert!(engine.get_latest(&id).unwrap().is_none());
    }

    #[test]
    fn test_reads_see_pending_writes() {
        let engine = test_engine();
        let id = StorageEngine::generate_id();

        let mut tx = engine.transaction();
        assert!(!tx.exists_typed("Seller", &id).unwrap());

        tx.insert("Seller", id, Record::new(vec![1]));
        assert!(tx.exists_typed("Seller", &id).unwrap());
        assert!(!tx.exists_typed("Client", &id).unwrap());

        tx.delete_typed("Seller", id);
        assert!(tx.is_deleting(&id));
        assert!(!tx.exists_typed("Seller", &id).unwrap());
    }

    #[test]
    fn test_delete_in_transaction() {
        let engine = test_engine();
        let id = StorageEngine::generate_id();

        let mut tx = engine.transaction();
        tx.insert("Notification", id, Record::new(vec![1]));
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.delete_typed("Notification", id);
        tx.commit().unwrap();

        assert!(engine.get_latest(&id).unwrap().is_none());
        assert_eq!(engine.count_entity_type("Notification"), 0);
    }

    #[test]
    fn test_commit_keeps_only_newest_version() {
        let engine = test_engine();
        let id = StorageEngine::generate_id();

        for data in [1u8, 2, 3] {
            let mut tx = engine.transaction();
            tx.insert("User", id, Record::new(vec![data]));
            tx.commit().unwrap();
        }

        let versions: Vec<_> = engine.scan_versions(&id).collect::<Result<_, _>>().unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].1.data, vec![3]);
        assert_eq!(engine.get_latest(&id).unwrap().unwrap().1.data, vec![3]);

        // Two writes of one record inside a transaction also leave one version.
        let mut tx = engine.transaction();
        tx.insert("User", id, Record::new(vec![4]))
            .insert("User", id, Record::new(vec![5]));
        tx.commit().unwrap();

        let versions: Vec<_> = engine.scan_versions(&id).collect::<Result<_, _>>().unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].1.data, vec![5]);
    }

    #[test]
    fn test_delete_leaves_only_tombstone() {
        let engine = test_engine();
        let id = StorageEngine::generate_id();
        let neighbour = StorageEngine::generate_id();

        let mut tx = engine.transaction();
        tx.insert("User", id, Record::new(b"secret".to_vec()))
            .insert("User", neighbour, Record::new(vec![9]));
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.insert("User", id, Record::new(b"newer secret".to_vec()));
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.delete_typed("User", id);
        tx.commit().unwrap();

        let versions: Vec<_> = engine.scan_versions(&id).collect::<Result<_, _>>().unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions[0].1.deleted);
        assert!(versions[0].1.data.is_empty());

        // Other records keep their data.
        assert_eq!(engine.scan_versions(&neighbour).count(), 1);
        assert!(engine.contains_typed("User", &neighbour).unwrap());
    }

    #[test]
    fn test_unique_claims() {
        let engine = test_engine();
        let owner = StorageEngine::generate_id();
        let key = b"User\0user_email_unique\0a@b.c".to_vec();

        let mut tx = engine.transaction();
        assert_eq!(tx.unique_owner(&key).unwrap(), None);
        tx.claim_unique(key.clone(), owner);
        assert_eq!(tx.unique_owner(&key).unwrap(), Some(owner));
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        assert_eq!(tx.unique_owner(&key).unwrap(), Some(owner));
        tx.release_unique(key.clone());
        assert_eq!(tx.unique_owner(&key).unwrap(), None);
        tx.commit().unwrap();

        assert_eq!(engine.transaction().unique_owner(&key).unwrap(), None);
    }

    #[test]
    fn test_empty_commit() {
        let engine = test_engine();
        engine.transaction().commit().unwrap();
    }
}
