//! The marketplace client.

use marketplace_core::Database;
use serde::Serialize;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::repository::{
    MessageRepository, NotificationRepository, ProductRepository, ProfileRepository,
    UserRepository,
};
use crate::schema::{marketplace_schema, CLIENT, MESSAGE, NOTIFICATION, PRODUCT, SELLER, USER};

/// Entry point to the marketplace data layer.
///
/// Cheap to share behind an `Arc`; writers are serialized internally.
pub struct MarketplaceClient {
    database: Database,
}

/// Record counts and storage figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub schema_version: u64,
    pub users: usize,
    pub clients: usize,
    pub sellers: usize,
    pub products: usize,
    pub messages: usize,
    pub notifications: usize,
    pub size_on_disk: u64,
}

impl MarketplaceClient {
    /// Open the database and make sure the marketplace schema is applied.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let database = Database::open(config.storage_config())?;
        let schema_version = database.ensure_schema(marketplace_schema())?;
        info!(
            schema_version,
            data_path = %config.data_path.display(),
            temporary = config.temporary,
            "marketplace client ready"
        );
        Ok(Self { database })
    }

    /// Open an in-memory database.
    pub fn temporary() -> Result<Self> {
        Self::open(ClientConfig::temporary())
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.database)
    }

    pub fn profiles(&self) -> ProfileRepository<'_> {
        ProfileRepository::new(&self.database)
    }

    pub fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.database)
    }

    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(&self.database)
    }

    pub fn notifications(&self) -> NotificationRepository<'_> {
        NotificationRepository::new(&self.database)
    }

    /// The underlying engine, for schema-level access.
    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn schema_version(&self) -> u64 {
        self.database.schema_version()
    }

    /// Count records of every entity.
    pub fn stats(&self) -> Result<Stats> {
        let lookup = self.database.lookup();
        Ok(Stats {
            schema_version: self.database.schema_version(),
            users: lookup.count(USER)?,
            clients: lookup.count(CLIENT)?,
            sellers: lookup.count(SELLER)?,
            products: lookup.count(PRODUCT)?,
            messages: lookup.count(MESSAGE)?,
            notifications: lookup.count(NOTIFICATION)?,
            size_on_disk: self.database.size_on_disk()?,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        Ok(self.database.flush()?)
    }
}
