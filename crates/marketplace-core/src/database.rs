//! Database wrapper combining the storage engine, catalog and unique index.

use parking_lot::{Mutex, MutexGuard};
use tracing::info;

use crate::catalog::{Catalog, EntityDef, SchemaBundle};
use crate::constraint::UniqueIndex;
use crate::error::{Error, ValidationError};
use crate::lookup::Lookup;
use crate::mutation::MutationExecutor;
use crate::storage::{StorageConfig, StorageEngine};

/// An open database: records, schema and indexes in one sled instance.
pub struct Database {
    storage: StorageEngine,
    catalog: Catalog,
    unique_index: UniqueIndex,
    /// Serializes writers so validation and commit happen as one step.
    write_lock: Mutex<()>,
}

impl Database {
    /// Open a database with the given storage configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        if !config.temporary {
            std::fs::create_dir_all(&config.path).map_err(|e| {
                Error::InvalidData(format!(
                    "failed to create data directory {}: {e}",
                    config.path.display()
                ))
            })?;
        }

        let storage = StorageEngine::open(config)?;
        let catalog = Catalog::open(storage.db())?;
        let unique_index = UniqueIndex::open(&storage);

        info!(
            schema_version = catalog.current_version(),
            recovered = storage.was_recovered(),
            "database opened"
        );

        Ok(Self {
            storage,
            catalog,
            unique_index,
            write_lock: Mutex::new(()),
        })
    }

    /// Apply `bundle` unless the stored schema already has the same definitions.
    ///
    /// Returns the schema version in effect afterwards.
    pub fn ensure_schema(&self, bundle: SchemaBundle) -> Result<u64, Error> {
        let _guard = self.write_lock.lock();

        if let Some(current) = self.catalog.current_schema() {
            if current.same_definitions(&bundle) {
                return Ok(current.version);
            }
        }

        let version = self.catalog.apply_schema(bundle)?;
        info!(version, "schema applied");
        Ok(version)
    }

    /// Get a reference to the storage engine.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Get a reference to the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get a reference to the unique index.
    pub fn unique_index(&self) -> &UniqueIndex {
        &self.unique_index
    }

    /// Snapshot of the current schema.
    pub fn schema(&self) -> Result<SchemaBundle, Error> {
        self.catalog.current_schema().ok_or(Error::NoSchema)
    }

    /// Look up an entity definition in the current schema.
    pub fn entity(&self, name: &str) -> Result<EntityDef, Error> {
        match self.catalog.get_entity(name) {
            Some(def) => Ok(def),
            None if self.catalog.current_version() == 0 => Err(Error::NoSchema),
            None => Err(ValidationError::UnknownEntity(name.to_string()).into()),
        }
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> u64 {
        self.catalog.current_version()
    }

    /// Create a mutation executor for this database.
    pub fn mutations(&self) -> MutationExecutor<'_> {
        MutationExecutor::new(self)
    }

    /// Create a read-side lookup for this database.
    pub fn lookup(&self) -> Lookup<'_> {
        Lookup::new(self)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.storage.flush()?;
        self.catalog.flush()
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        self.storage.size_on_disk()
    }

    pub(crate) fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, ScalarType};

    fn schema() -> SchemaBundle {
        SchemaBundle::new(0).with_entity(
            EntityDef::new("Notification", "id")
                .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Uuid)))
                .with_field(FieldDef::new("content", FieldType::scalar(ScalarType::String))),
        )
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let db = Database::open(StorageConfig::temporary()).unwrap();
        assert!(matches!(db.schema(), Err(Error::NoSchema)));
        assert!(matches!(db.entity("Notification"), Err(Error::NoSchema)));

        assert_eq!(db.ensure_schema(schema()).unwrap(), 1);
        assert_eq!(db.ensure_schema(schema()).unwrap(), 1);
        assert_eq!(db.schema_version(), 1);
        assert!(db.entity("Notification").is_ok());
        assert!(matches!(
            db.entity("Order"),
            Err(Error::Validation(ValidationError::UnknownEntity(_)))
        ));

        let changed = schema().with_entity(
            EntityDef::new("Seller", "id")
                .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Uuid))),
        );
        assert_eq!(db.ensure_schema(changed).unwrap(), 2);
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data");

        let db = Database::open(StorageConfig::new(&path)).unwrap();
        db.ensure_schema(schema()).unwrap();
        db.flush().unwrap();

        assert!(path.exists());
    }
}
