//! Write inputs for the repositories.
//!
//! Caller-side rules (password length, profile/role match, stock sign) are
//! checked here before anything is handed to the engine.

use marketplace_core::{Decimal, Value};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::id::Id;
use crate::models::Role;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Reject passwords shorter than [`MIN_PASSWORD_LENGTH`].
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<()> {
    if stock < 0 {
        return Err(Error::InvalidInput {
            field: "stock",
            reason: format!("must not be negative, got {stock}"),
        });
    }
    Ok(())
}

/// Nested client profile for [`CreateUser`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateClient {
    pub firstname: String,
    pub lastname: String,
}

impl CreateClient {
    pub fn new(firstname: impl Into<String>, lastname: impl Into<String>) -> Self {
        Self {
            firstname: firstname.into(),
            lastname: lastname.into(),
        }
    }
}

/// Nested seller profile for [`CreateUser`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateSeller {
    pub business_name: String,
}

impl CreateSeller {
    pub fn new(business_name: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
        }
    }
}

/// Input for creating a user, optionally with its profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub username: String,
    pub password: String,
    /// Required by the schema; left optional so a missing role is reported
    /// by validation rather than by the type system.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub client: Option<CreateClient>,
    #[serde(default)]
    pub seller: Option<CreateSeller>,
}

impl CreateUser {
    /// Start a user input without role or profile.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            role: None,
            profile_picture: None,
            client: None,
            seller: None,
        }
    }

    /// A CLIENT user with its client profile.
    pub fn client(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        profile: CreateClient,
    ) -> Self {
        Self::new(email, username, password)
            .with_role(Role::Client)
            .with_client(profile)
    }

    /// A SELLER user with its seller profile.
    pub fn seller(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        profile: CreateSeller,
    ) -> Self {
        Self::new(email, username, password)
            .with_role(Role::Seller)
            .with_seller(profile)
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_profile_picture(mut self, url: impl Into<String>) -> Self {
        self.profile_picture = Some(url.into());
        self
    }

    pub fn with_client(mut self, profile: CreateClient) -> Self {
        self.client = Some(profile);
        self
    }

    pub fn with_seller(mut self, profile: CreateSeller) -> Self {
        self.seller = Some(profile);
        self
    }

    /// Check the caller-side rules.
    ///
    /// A missing role is left for the schema to reject.
    pub fn validate(&self) -> Result<()> {
        validate_password(&self.password)?;

        let Some(role) = self.role else {
            return Ok(());
        };
        let reason = match (role, self.client.is_some(), self.seller.is_some()) {
            (Role::Client, false, _) => "requires a client profile",
            (Role::Client, _, true) => "cannot have a seller profile",
            (Role::Seller, _, false) => "requires a seller profile",
            (Role::Seller, true, _) => "cannot have a client profile",
            _ => return Ok(()),
        };
        Err(Error::ProfileMismatch { role, reason })
    }

    pub(crate) fn user_fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![
            ("email".to_string(), Value::from(self.email.as_str())),
            ("username".to_string(), Value::from(self.username.as_str())),
            ("password".to_string(), Value::from(self.password.as_str())),
        ];
        if let Some(role) = self.role {
            fields.push(("role".to_string(), Value::from(role)));
        }
        if let Some(url) = &self.profile_picture {
            fields.push(("profile_picture".to_string(), Value::from(url.as_str())));
        }
        fields
    }
}

/// Partial update of a user. Unset fields keep their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `None` leaves the picture, `Some(None)` clears it.
    pub profile_picture: Option<Option<String>>,
}

impl UpdateUser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn profile_picture(mut self, url: impl Into<String>) -> Self {
        self.profile_picture = Some(Some(url.into()));
        self
    }

    pub fn clear_profile_picture(mut self) -> Self {
        self.profile_picture = Some(None);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.password {
            Some(password) => validate_password(password),
            None => Ok(()),
        }
    }

    pub(crate) fn changes(&self) -> Vec<(String, Value)> {
        let mut changes = Vec::new();
        if let Some(email) = &self.email {
            changes.push(("email".to_string(), Value::from(email.as_str())));
        }
        if let Some(username) = &self.username {
            changes.push(("username".to_string(), Value::from(username.as_str())));
        }
        if let Some(password) = &self.password {
            changes.push(("password".to_string(), Value::from(password.as_str())));
        }
        if let Some(picture) = &self.profile_picture {
            changes.push(("profile_picture".to_string(), Value::from(picture.as_deref())));
        }
        changes
    }
}

/// Connects a product to an existing seller by the seller's id.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SellerConnect {
    pub id: Id,
}

/// Input for listing a product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub seller: SellerConnect,
}

impl CreateProduct {
    /// A product connected to `seller_id`.
    pub fn new(
        seller_id: Id,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        stock: i32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
            stock,
            seller: SellerConnect { id: seller_id },
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_stock(self.stock)
    }

    pub(crate) fn fields(&self) -> Vec<(String, Value)> {
        vec![
            ("seller_id".to_string(), Value::from(self.seller.id)),
            ("name".to_string(), Value::from(self.name.as_str())),
            ("description".to_string(), Value::from(self.description.as_str())),
            ("price".to_string(), Value::Decimal(self.price)),
            ("stock".to_string(), Value::Int32(self.stock)),
        ]
    }
}

pub(crate) fn stock_change(stock: i32) -> Result<Vec<(String, Value)>> {
    validate_stock(stock)?;
    Ok(vec![("stock".to_string(), Value::Int32(stock))])
}

/// Input for sending a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateMessage {
    pub sender_id: Id,
    pub recipient_id: Id,
    pub content: String,
}

impl CreateMessage {
    pub fn new(sender_id: Id, recipient_id: Id, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            recipient_id,
            content: content.into(),
        }
    }

    pub(crate) fn fields(&self) -> Vec<(String, Value)> {
        vec![
            ("sender_id".to_string(), Value::from(self.sender_id)),
            ("recipient_id".to_string(), Value::from(self.recipient_id)),
            ("content".to_string(), Value::from(self.content.as_str())),
        ]
    }
}

/// Input for notifying a user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateNotification {
    pub user_id: Id,
    pub content: String,
}

impl CreateNotification {
    pub fn new(user_id: Id, content: impl Into<String>) -> Self {
        Self {
            user_id,
            content: content.into(),
        }
    }

    pub(crate) fn fields(&self) -> Vec<(String, Value)> {
        vec![
            ("user_id".to_string(), Value::from(self.user_id)),
            ("content".to_string(), Value::from(self.content.as_str())),
        ]
    }
}
