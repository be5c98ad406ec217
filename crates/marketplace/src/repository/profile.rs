//! Access to client and seller profiles.
//!
//! Profiles are created with their user and removed with it, or cleared in
//! bulk.

use marketplace_core::{Database, Value};
use tracing::{debug, instrument};

use super::{decode_all, decode_one};
use crate::error::Result;
use crate::id::Id;
use crate::models::{BulkDeleteSummary, Client, Seller};
use crate::schema::{CLIENT, SELLER};

/// Lookups and bulk deletes over [`Client`] and [`Seller`] profiles.
pub struct ProfileRepository<'a> {
    database: &'a Database,
}

impl<'a> ProfileRepository<'a> {
    pub(crate) fn new(database: &'a Database) -> Self {
        Self { database }
    }

    pub fn find_client(&self, id: Id) -> Result<Option<Client>> {
        decode_one(self.database.lookup().get(CLIENT, id.as_bytes())?)
    }

    /// The client profile owned by `user_id`.
    pub fn find_client_by_user(&self, user_id: Id) -> Result<Option<Client>> {
        decode_one(
            self.database
                .lookup()
                .find_unique(CLIENT, "user_id", &Value::from(user_id))?,
        )
    }

    pub fn find_seller(&self, id: Id) -> Result<Option<Seller>> {
        decode_one(self.database.lookup().get(SELLER, id.as_bytes())?)
    }

    /// The seller profile owned by `user_id`.
    pub fn find_seller_by_user(&self, user_id: Id) -> Result<Option<Seller>> {
        decode_one(
            self.database
                .lookup()
                .find_unique(SELLER, "user_id", &Value::from(user_id))?,
        )
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        decode_all(self.database.lookup().scan(CLIENT)?)
    }

    pub fn list_sellers(&self) -> Result<Vec<Seller>> {
        decode_all(self.database.lookup().scan(SELLER)?)
    }

    /// Delete every client profile. Their users are kept.
    #[instrument(skip(self))]
    pub fn delete_all_clients(&self) -> Result<BulkDeleteSummary> {
        self.delete_all(CLIENT)
    }

    /// Delete every seller profile together with its products.
    #[instrument(skip(self))]
    pub fn delete_all_sellers(&self) -> Result<BulkDeleteSummary> {
        self.delete_all(SELLER)
    }

    fn delete_all(&self, entity: &str) -> Result<BulkDeleteSummary> {
        let summary = BulkDeleteSummary::new(entity, self.database.mutations().delete_all(entity)?);
        debug!(entity, removed = summary.total(), "profiles deleted");
        Ok(summary)
    }
}
