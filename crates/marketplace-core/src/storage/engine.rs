//! Storage engine implementation.

use super::{EntityId, Record, StorageConfig, VersionedKey};
use crate::error::Error;
use sled::{Db, Tree};
use std::sync::atomic::{AtomicU64, Ordering};

/// Tree name for entity data.
const DATA_TREE: &str = "data";

/// Tree name for metadata (latest versions).
const META_TREE: &str = "meta";

/// Tree name for entity type index.
const TYPE_INDEX_TREE: &str = "index:entity_type";

/// Tree name for unique constraint index.
pub const UNIQUE_INDEX_TREE: &str = "index:unique";

/// Prefix for latest version pointers in meta tree.
const LATEST_PREFIX: &[u8] = b"latest:";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Versioned records.
    data_tree: Tree,

    /// Latest version pointers.
    meta_tree: Tree,

    /// Entity type index (entity_type + \0 + entity_id -> empty).
    type_index_tree: Tree,

    /// Unique constraint index.
    unique_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let data_tree = db.open_tree(DATA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;
        let type_index_tree = db.open_tree(TYPE_INDEX_TREE)?;
        let unique_tree = db.open_tree(UNIQUE_INDEX_TREE)?;

        tracing::debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "opened storage engine"
        );

        Ok(Self {
            db,
            data_tree,
            meta_tree,
            type_index_tree,
            unique_tree,
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Put a new versioned record without type indexing.
    ///
    /// Earlier versions are kept. Writes through a [`super::Transaction`]
    /// replace them instead.
    pub fn put(&self, key: VersionedKey, record: Record) -> Result<(), Error> {
        self.data_tree.insert(key.encode(), record.to_bytes()?)?;
        self.meta_tree
            .insert(latest_key(&key.entity_id), &key.version_ts.to_be_bytes())?;
        Ok(())
    }

    /// Get a specific version of an entity.
    pub fn get(&self, entity_id: &EntityId, version_ts: u64) -> Result<Option<Record>, Error> {
        let key = VersionedKey::new(*entity_id, version_ts);

        match self.data_tree.get(key.encode())? {
            Some(bytes) => {
                let record = Record::from_bytes(&bytes)?;
                Ok((!record.deleted).then_some(record))
            }
            None => Ok(None),
        }
    }

    /// Get the latest live version of an entity.
    ///
    /// Returns the version timestamp and record, or `None` if the entity
    /// never existed or its latest version is a tombstone.
    pub fn get_latest(&self, entity_id: &EntityId) -> Result<Option<(u64, Record)>, Error> {
        let version_ts = match self.meta_tree.get(latest_key(entity_id))? {
            Some(bytes) => {
                let buf: [u8; 8] = bytes.as_ref().try_into().map_err(|_| Error::InvalidKey)?;
                u64::from_be_bytes(buf)
            }
            None => return Ok(None),
        };

        Ok(self
            .get(entity_id, version_ts)?
            .map(|record| (version_ts, record)))
    }

    /// Scan all versions of an entity, oldest first, tombstones included.
    pub fn scan_versions(
        &self,
        entity_id: &EntityId,
    ) -> impl Iterator<Item = Result<(u64, Record), Error>> + '_ {
        let min_key = VersionedKey::min_for_entity(*entity_id);
        let max_key = VersionedKey::max_for_entity(*entity_id);

        self.data_tree
            .range(min_key.encode()..=max_key.encode())
            .map(|result| {
                let (key_bytes, value_bytes) = result?;
                let key = VersionedKey::decode(&key_bytes).ok_or(Error::InvalidKey)?;
                let record = Record::from_bytes(&value_bytes)?;
                Ok((key.version_ts, record))
            })
    }

    // ========== Entity Type-Aware Methods ==========

    /// Put a versioned record and index it under its entity type.
    pub fn put_typed(
        &self,
        entity_type: &str,
        key: VersionedKey,
        record: Record,
    ) -> Result<(), Error> {
        self.put(key, record)?;
        self.type_index_tree
            .insert(type_index_key(entity_type, &key.entity_id), &[])?;
        Ok(())
    }

    /// Replace every version of an entity with a tombstone and drop it from
    /// the type index.
    pub fn delete_typed(&self, entity_type: &str, entity_id: &EntityId) -> Result<(), Error> {
        let mut tx = self.transaction();
        tx.delete_typed(entity_type, *entity_id);
        tx.commit()
    }

    /// Check whether a live entity of the given type exists.
    pub fn contains_typed(&self, entity_type: &str, entity_id: &EntityId) -> Result<bool, Error> {
        Ok(self.get_typed(entity_type, entity_id)?.is_some())
    }

    /// Get the latest version of an entity, only if it is of `entity_type`.
    pub fn get_typed(
        &self,
        entity_type: &str,
        entity_id: &EntityId,
    ) -> Result<Option<(u64, Record)>, Error> {
        if !self
            .type_index_tree
            .contains_key(type_index_key(entity_type, entity_id))?
        {
            return Ok(None);
        }
        self.get_latest(entity_id)
    }

    /// Scan all live entities of a given type.
    ///
    /// Yields `(entity_id, version_ts, record)` in id order.
    pub fn scan_entity_type(
        &self,
        entity_type: &str,
    ) -> impl Iterator<Item = Result<(EntityId, u64, Record), Error>> + '_ {
        let prefix = type_index_prefix(entity_type);
        let prefix_len = prefix.len();

        self.type_index_tree
            .scan_prefix(&prefix)
            .filter_map(move |result| {
                let entity_id = match result {
                    Ok((key, _)) => match key[prefix_len..].try_into() {
                        Ok(id) => id,
                        Err(_) => return Some(Err(Error::InvalidKey)),
                    },
                    Err(e) => return Some(Err(e.into())),
                };

                match self.get_latest(&entity_id) {
                    Ok(Some((version_ts, record))) => Some(Ok((entity_id, version_ts, record))),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            })
    }

    /// Count live entities of a given type.
    pub fn count_entity_type(&self, entity_type: &str) -> usize {
        self.type_index_tree
            .scan_prefix(type_index_prefix(entity_type))
            .count()
    }

    // ========== End Entity Type-Aware Methods ==========

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.db.size_on_disk()?)
    }

    /// Generate a new entity ID (UUID v4 layout).
    pub fn generate_id() -> EntityId {
        // Counter keeps ids distinct when the clock does not move.
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&now.to_le_bytes());
        id[8..16].copy_from_slice(&counter.to_le_bytes());

        id[6] = (id[6] & 0x0f) | 0x40;
        id[8] = (id[8] & 0x3f) | 0x80;

        id
    }

    pub(crate) fn data_tree(&self) -> &Tree {
        &self.data_tree
    }

    pub(crate) fn meta_tree(&self) -> &Tree {
        &self.meta_tree
    }

    pub(crate) fn type_index_tree(&self) -> &Tree {
        &self.type_index_tree
    }

    pub(crate) fn unique_tree(&self) -> &Tree {
        &self.unique_tree
    }

    /// Get the underlying sled database (for opening new trees).
    pub fn db(&self) -> &Db {
        &self.db
    }
}

/// Metadata key for the latest version pointer.
pub(crate) fn latest_key(entity_id: &EntityId) -> Vec<u8> {
    let mut key = Vec::with_capacity(LATEST_PREFIX.len() + 16);
    key.extend_from_slice(LATEST_PREFIX);
    key.extend_from_slice(entity_id);
    key
}

/// Type index key for an entity type + entity ID.
pub(crate) fn type_index_key(entity_type: &str, entity_id: &EntityId) -> Vec<u8> {
    let mut key = type_index_prefix(entity_type);
    key.extend_from_slice(entity_id);
    key
}

fn type_index_prefix(entity_type: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(entity_type.len() + 1 + 16);
    prefix.extend_from_slice(entity_type.as_bytes());
    prefix.push(0);
    prefix
}
