//! User repository.

use marketplace_core::error::Error as CoreError;
use marketplace_core::{Database, NewRecord, Value};
use tracing::{debug, instrument};

use super::{decode_all, decode_one, ProfileRepository};
use crate::error::{Error, Result};
use crate::id::Id;
use crate::input::{CreateUser, UpdateUser};
use crate::models::{BulkDeleteSummary, DeleteSummary, User, UserWithProfile};
use crate::schema::{CLIENT, SELLER, USER};

/// Create, read, update and delete users.
pub struct UserRepository<'a> {
    database: &'a Database,
}

impl<'a> UserRepository<'a> {
    pub(crate) fn new(database: &'a Database) -> Self {
        Self { database }
    }

    /// Create a user together with its nested profile.
    ///
    /// The user and the profile are committed in one transaction.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub fn create(&self, input: CreateUser) -> Result<UserWithProfile> {
        input.validate()?;

        let user = NewRecord::new(USER, input.user_fields());
        let user_id = Value::Uuid(user.id);
        let mut records = vec![user];
        if let Some(profile) = &input.client {
            records.push(
                NewRecord::new(CLIENT, Vec::new())
                    .with("user_id", user_id.clone())
                    .with("firstname", profile.firstname.as_str())
                    .with("lastname", profile.lastname.as_str()),
            );
        }
        if let Some(profile) = &input.seller {
            records.push(
                NewRecord::new(SELLER, Vec::new())
                    .with("user_id", user_id)
                    .with("business_name", profile.business_name.as_str()),
            );
        }

        let mut rows = self.database.mutations().insert_batch(records)?.into_iter();
        let user = User::try_from(rows.next().ok_or_else(|| {
            Error::Core(CoreError::InvalidData("user insert returned no rows".into()))
        })?)?;

        let mut created = UserWithProfile {
            user,
            client: None,
            seller: None,
        };
        for row in rows {
            match row.entity.as_str() {
                CLIENT => created.client = Some(row.try_into()?),
                SELLER => created.seller = Some(row.try_into()?),
                _ => {}
            }
        }

        debug!(id = %created.user.id, role = %created.user.role, "user created");
        Ok(created)
    }

    /// Get a user by id.
    pub fn find_by_id(&self, id: Id) -> Result<Option<User>> {
        decode_one(self.database.lookup().get(USER, id.as_bytes())?)
    }

    /// Get a user by email.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        decode_one(
            self.database
                .lookup()
                .find_unique(USER, "email", &Value::from(email))?,
        )
    }

    /// Get a user by username.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        decode_one(
            self.database
                .lookup()
                .find_unique(USER, "username", &Value::from(username))?,
        )
    }

    /// Get a user with its client or seller profile.
    pub fn find_with_profile(&self, id: Id) -> Result<Option<UserWithProfile>> {
        let Some(user) = self.find_by_id(id)? else {
            return Ok(None);
        };
        let profiles = ProfileRepository::new(self.database);
        Ok(Some(UserWithProfile {
            client: profiles.find_client_by_user(id)?,
            seller: profiles.find_seller_by_user(id)?,
            user,
        }))
    }

    /// All users, oldest first.
    pub fn list(&self) -> Result<Vec<User>> {
        decode_all(self.database.lookup().scan(USER)?)
    }

    /// Number of users.
    pub fn count(&self) -> Result<usize> {
        Ok(self.database.lookup().count(USER)?)
    }

    /// Apply a partial update.
    #[instrument(skip(self, input))]
    pub fn update(&self, id: Id, input: UpdateUser) -> Result<User> {
        input.validate()?;
        let row = self
            .database
            .mutations()
            .update(USER, id.as_bytes(), input.changes())?;
        User::try_from(row)
    }

    /// Delete a user and everything that belongs to it.
    #[instrument(skip(self))]
    pub fn delete(&self, id: Id) -> Result<DeleteSummary> {
        let summary = DeleteSummary::from(self.database.mutations().delete(USER, id.as_bytes())?);
        debug!(removed = summary.total(), "user deleted");
        Ok(summary)
    }

    /// Delete every user, each with everything that belongs to it.
    ///
    /// Runs as one transaction under a single write lock.
    #[instrument(skip(self))]
    pub fn delete_all(&self) -> Result<BulkDeleteSummary> {
        let outcomes = self.database.mutations().delete_all(USER)?;
        let summary = BulkDeleteSummary::new(USER, outcomes);
        debug!(users = summary.matched, removed = summary.total(), "users deleted");
        Ok(summary)
    }
}
