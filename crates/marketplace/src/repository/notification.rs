//! Notification repository.

use marketplace_core::{Database, Value};
use tracing::debug;

use super::{decode_all, decode_one};
use crate::error::Result;
use crate::id::Id;
use crate::input::CreateNotification;
use crate::models::{DeleteSummary, Notification};
use crate::schema::NOTIFICATION;

/// Notifications addressed to users.
pub struct NotificationRepository<'a> {
    database: &'a Database,
}

impl<'a> NotificationRepository<'a> {
    pub(crate) fn new(database: &'a Database) -> Self {
        Self { database }
    }

    pub fn create(&self, input: CreateNotification) -> Result<Notification> {
        let row = self
            .database
            .mutations()
            .insert(NOTIFICATION, input.fields())?;
        let notification = Notification::try_from(row)?;
        debug!(id = %notification.id, user = %notification.user_id, "notification created");
        Ok(notification)
    }

    pub fn find_by_id(&self, id: Id) -> Result<Option<Notification>> {
        decode_one(self.database.lookup().get(NOTIFICATION, id.as_bytes())?)
    }

    /// Notifications for `user_id`, oldest first.
    pub fn list_for_user(&self, user_id: Id) -> Result<Vec<Notification>> {
        decode_all(
            self.database
                .lookup()
                .filter_eq(NOTIFICATION, "user_id", &Value::from(user_id))?,
        )
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.database.lookup().count(NOTIFICATION)?)
    }

    pub fn delete(&self, id: Id) -> Result<DeleteSummary> {
        Ok(self
            .database
            .mutations()
            .delete(NOTIFICATION, id.as_bytes())?
            .into())
    }
}
