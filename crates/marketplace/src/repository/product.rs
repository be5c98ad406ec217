//! Product repository.

use marketplace_core::{Database, Value};
use tracing::{debug, instrument};

use super::{decode_all, decode_one, ProfileRepository};
use crate::error::{Error, Result};
use crate::id::Id;
use crate::input::{stock_change, CreateProduct};
use crate::models::{DeleteSummary, Product, ProductWithSeller};
use crate::schema::{PRODUCT, SELLER};

/// Products listed by sellers.
pub struct ProductRepository<'a> {
    database: &'a Database,
}

impl<'a> ProductRepository<'a> {
    pub(crate) fn new(database: &'a Database) -> Self {
        Self { database }
    }

    /// List a product for the seller named by `input.seller`.
    ///
    /// The seller id must belong to a live [`Seller`](crate::models::Seller);
    /// any other id fails with [`Error::RelationNotFound`].
    #[instrument(skip(self, input), fields(seller = %input.seller.id))]
    pub fn create(&self, input: CreateProduct) -> Result<Product> {
        input.validate()?;
        let row = self.database.mutations().insert(PRODUCT, input.fields())?;
        let product = Product::try_from(row)?;
        debug!(id = %product.id, "product created");
        Ok(product)
    }

    pub fn find_by_id(&self, id: Id) -> Result<Option<Product>> {
        decode_one(self.database.lookup().get(PRODUCT, id.as_bytes())?)
    }

    /// Get a product with its seller.
    pub fn find_with_seller(&self, id: Id) -> Result<Option<ProductWithSeller>> {
        let Some(product) = self.find_by_id(id)? else {
            return Ok(None);
        };
        let seller = ProfileRepository::new(self.database)
            .find_seller(product.seller_id)?
            .ok_or_else(|| Error::NotFound {
                entity: SELLER.to_string(),
                id: product.seller_id.to_hex(),
            })?;
        Ok(Some(ProductWithSeller { product, seller }))
    }

    /// All products, oldest first.
    pub fn list(&self) -> Result<Vec<Product>> {
        decode_all(self.database.lookup().scan(PRODUCT)?)
    }

    /// Products of one seller, oldest first.
    pub fn list_by_seller(&self, seller_id: Id) -> Result<Vec<Product>> {
        decode_all(
            self.database
                .lookup()
                .filter_eq(PRODUCT, "seller_id", &Value::from(seller_id))?,
        )
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.database.lookup().count(PRODUCT)?)
    }

    /// Set the stock level. Negative stock is rejected.
    pub fn update_stock(&self, id: Id, stock: i32) -> Result<Product> {
        let changes = stock_change(stock)?;
        let row = self
            .database
            .mutations()
            .update(PRODUCT, id.as_bytes(), changes)?;
        Product::try_from(row)
    }

    pub fn delete(&self, id: Id) -> Result<DeleteSummary> {
        Ok(self.database.mutations().delete(PRODUCT, id.as_bytes())?.into())
    }
}
