//! Typed records returned by the repositories.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use marketplace_core::error::{Error as CoreError, ValidationError};
use marketplace_core::{Decimal, DeleteOutcome, Row, Value};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::Id;
use crate::schema::USER;

/// Account role. Decides which profile a user carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Buyer with a [`Client`] profile.
    Client,
    /// Vendor with a [`Seller`] profile.
    Seller,
}

impl Role {
    /// Stored name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Seller => "SELLER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CLIENT" => Ok(Role::Client),
            "SELLER" => Ok(Role::Seller),
            other => Err(Error::Validation(ValidationError::InvalidEnumValue {
                entity: USER.to_string(),
                field: "role".to_string(),
                value: other.to_string(),
                allowed: vec!["CLIENT".to_string(), "SELLER".to_string()],
            })),
        }
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::from(role.as_str())
    }
}

/// A marketplace account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub created_at: i64,
}

/// Buyer profile of a CLIENT user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Client {
    pub id: Id,
    pub user_id: Id,
    pub firstname: String,
    pub lastname: String,
    pub created_at: i64,
}

/// Vendor profile of a SELLER user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seller {
    pub id: Id,
    pub user_id: Id,
    pub business_name: String,
    pub created_at: i64,
}

/// An item listed by a seller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: Id,
    pub seller_id: Id,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub created_at: i64,
}

/// A direct message between two users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Id,
    pub sender_id: Id,
    pub recipient_id: Id,
    pub content: String,
    pub created_at: i64,
}

/// A notice addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Id,
    pub user_id: Id,
    pub content: String,
    pub created_at: i64,
}

/// A user with its profile included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserWithProfile {
    #[serde(flatten)]
    pub user: User,
    pub client: Option<Client>,
    pub seller: Option<Seller>,
}

/// A product with its seller included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductWithSeller {
    #[serde(flatten)]
    pub product: Product,
    pub seller: Seller,
}

/// What a delete removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteSummary {
    /// Entity type of the deleted record.
    pub entity: String,
    /// Id of the deleted record.
    pub id: Id,
    /// Removed record counts per entity type, the root included.
    pub deleted: BTreeMap<String, usize>,
}

impl DeleteSummary {
    /// Number of removed records of `entity`.
    pub fn count(&self, entity: &str) -> usize {
        self.deleted.get(entity).copied().unwrap_or(0)
    }

    /// Total number of removed records.
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

impl From<DeleteOutcome> for DeleteSummary {
    fn from(outcome: DeleteOutcome) -> Self {
        Self {
            deleted: outcome.deleted_by_entity(),
            entity: outcome.entity,
            id: Id::from(outcome.id),
        }
    }
}

/// Result of removing every record of an entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteSummary {
    /// Entity type the delete targeted.
    pub entity: String,
    /// Number of targeted records removed.
    pub matched: usize,
    /// Removed record counts per entity type, cascades included.
    pub deleted: BTreeMap<String, usize>,
}

impl BulkDeleteSummary {
    /// Fold per-record delete outcomes into one summary.
    pub fn new(entity: impl Into<String>, outcomes: Vec<DeleteOutcome>) -> Self {
        let mut deleted = BTreeMap::new();
        for outcome in &outcomes {
            for (name, count) in outcome.deleted_by_entity() {
                *deleted.entry(name).or_insert(0) += count;
            }
        }
        Self {
            entity: entity.into(),
            matched: outcomes.len(),
            deleted,
        }
    }

    /// Number of removed records of `entity`.
    pub fn count(&self, entity: &str) -> usize {
        self.deleted.get(entity).copied().unwrap_or(0)
    }

    /// Total number of removed records.
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

fn malformed(row: &Row, field: &str) -> Error {
    Error::Core(CoreError::InvalidData(format!(
        "{} {} has no valid '{field}'",
        row.entity,
        row.id_hex()
    )))
}

fn text(row: &Row, field: &str) -> Result<String> {
    row.get_str(field)
        .map(str::to_string)
        .ok_or_else(|| malformed(row, field))
}

fn optional_text(row: &Row, field: &str) -> Option<String> {
    row.get_str(field).map(str::to_string)
}

fn reference(row: &Row, field: &str) -> Result<Id> {
    row.get_uuid(field)
        .map(Id::from)
        .ok_or_else(|| malformed(row, field))
}

fn created_at(row: &Row) -> Result<i64> {
    row.created_at().ok_or_else(|| malformed(row, "created_at"))
}

impl TryFrom<Row> for User {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self> {
        Ok(Self {
            id: Id::from(row.id),
            email: text(&row, "email")?,
            username: text(&row, "username")?,
            password: text(&row, "password")?,
            role: text(&row, "role")?.parse()?,
            profile_picture: optional_text(&row, "profile_picture"),
            created_at: created_at(&row)?,
        })
    }
}

impl TryFrom<Row> for Client {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self> {
        Ok(Self {
            id: Id::from(row.id),
            user_id: reference(&row, "user_id")?,
            firstname: text(&row, "firstname")?,
            lastname: text(&row, "lastname")?,
            created_at: created_at(&row)?,
        })
    }
}

impl TryFrom<Row> for Seller {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self> {
        Ok(Self {
            id: Id::from(row.id),
            user_id: reference(&row, "user_id")?,
            business_name: text(&row, "business_name")?,
            created_at: created_at(&row)?,
        })
    }
}

impl TryFrom<Row> for Product {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self> {
        Ok(Self {
            id: Id::from(row.id),
            seller_id: reference(&row, "seller_id")?,
            name: text(&row, "name")?,
            description: text(&row, "description")?,
            price: row
                .get("price")
                .and_then(Value::as_decimal)
                .ok_or_else(|| malformed(&row, "price"))?,
            stock: row
                .get("stock")
                .and_then(Value::as_i32)
                .ok_or_else(|| malformed(&row, "stock"))?,
            created_at: created_at(&row)?,
        })
    }
}

impl TryFrom<Row> for Message {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self> {
        Ok(Self {
            id: Id::from(row.id),
            sender_id: reference(&row, "sender_id")?,
            recipient_id: reference(&row, "recipient_id")?,
            content: text(&row, "content")?,
            created_at: created_at(&row)?,
        })
    }
}

impl TryFrom<Row> for Notification {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self> {
        Ok(Self {
            id: Id::from(row.id),
            user_id: reference(&row, "user_id")?,
            content: text(&row, "content")?,
            created_at: created_at(&row)?,
        })
    }
}
