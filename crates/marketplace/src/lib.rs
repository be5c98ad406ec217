//! Marketplace - data layer for users, profiles, products, messages and
//! notifications.
//!
//! Rules are enforced at write time by the `marketplace-core` engine: unique
//! emails and usernames, a mandatory role, typed foreign keys and cascading
//! deletes. Caller-side rules such as the password length live in [`input`].
//!
//! # Quick Start
//!
//! ```
//! use marketplace::{CreateClient, CreateUser, MarketplaceClient};
//!
//! # fn main() -> Result<(), marketplace::Error> {
//! let client = MarketplaceClient::temporary()?;
//!
//! let created = client.users().create(CreateUser::client(
//!     "ada@example.com",
//!     "ada",
//!     "correct horse",
//!     CreateClient::new("Ada", "Lovelace"),
//! ))?;
//! assert!(created.client.is_some());
//!
//! let found = client.users().find_by_email("ada@example.com")?;
//! assert_eq!(found.map(|u| u.id), Some(created.user.id));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod input;
pub mod models;
pub mod repository;
pub mod schema;

pub use client::{MarketplaceClient, Stats};
pub use config::{Args, ClientConfig};
pub use error::{Error, Result};
pub use id::Id;
pub use input::{
    CreateClient, CreateMessage, CreateNotification, CreateProduct, CreateSeller, CreateUser,
    SellerConnect, UpdateUser,
};
pub use models::{
    BulkDeleteSummary, Client, DeleteSummary, Message, Notification, Product, ProductWithSeller,
    Role, Seller, User, UserWithProfile,
};

/// Re-export of the engine crate.
pub use marketplace_core as engine;
