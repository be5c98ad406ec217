//! Message repository.

use marketplace_core::{Database, Value};
use tracing::debug;

use super::{decode_all, decode_one};
use crate::error::Result;
use crate::id::Id;
use crate::input::CreateMessage;
use crate::models::{DeleteSummary, Message};
use crate::schema::MESSAGE;

/// Direct messages between users.
pub struct MessageRepository<'a> {
    database: &'a Database,
}

impl<'a> MessageRepository<'a> {
    pub(crate) fn new(database: &'a Database) -> Self {
        Self { database }
    }

    /// Store a message. Sender and recipient must both be live users.
    pub fn send(&self, input: CreateMessage) -> Result<Message> {
        let row = self.database.mutations().insert(MESSAGE, input.fields())?;
        let message = Message::try_from(row)?;
        debug!(id = %message.id, sender = %message.sender_id, "message sent");
        Ok(message)
    }

    pub fn find_by_id(&self, id: Id) -> Result<Option<Message>> {
        decode_one(self.database.lookup().get(MESSAGE, id.as_bytes())?)
    }

    /// Messages sent by `user_id`, oldest first.
    pub fn list_sent(&self, user_id: Id) -> Result<Vec<Message>> {
        self.list_by("sender_id", user_id)
    }

    /// Messages addressed to `user_id`, oldest first.
    pub fn list_received(&self, user_id: Id) -> Result<Vec<Message>> {
        self.list_by("recipient_id", user_id)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.database.lookup().count(MESSAGE)?)
    }

    pub fn delete(&self, id: Id) -> Result<DeleteSummary> {
        Ok(self.database.mutations().delete(MESSAGE, id.as_bytes())?.into())
    }

    fn list_by(&self, field: &str, user_id: Id) -> Result<Vec<Message>> {
        decode_all(
            self.database
                .lookup()
                .filter_eq(MESSAGE, field, &Value::from(user_id))?,
        )
    }
}
