//! Per-entity repositories over a [`Database`](marketplace_core::Database).

mod message;
mod notification;
mod product;
mod profile;
mod user;

pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use product::ProductRepository;
pub use profile::ProfileRepository;
pub use user::UserRepository;

use marketplace_core::Row;

use crate::error::{Error, Result};

fn decode_one<T>(row: Option<Row>) -> Result<Option<T>>
where
    T: TryFrom<Row, Error = Error>,
{
    row.map(T::try_from).transpose()
}

fn decode_all<T>(rows: Vec<Row>) -> Result<Vec<T>>
where
    T: TryFrom<Row, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}
