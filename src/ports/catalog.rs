use uuid::Uuid;

use crate::domain::aggregates::{Category, Product, ProductStatus};
use crate::domain::value_objects::{PageRequest, Paginated};

use super::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category_id: Option<Uuid>,
    /// Restricts to one seller's products.
    pub author_id: Option<Uuid>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    pub page: PageRequest,
}

impl ProductQuery {
    pub fn matches(&self, product: &Product) -> bool {
        if self.status.is_some_and(|s| s != product.status()) {
            return false;
        }
        if self.category_id.is_some_and(|c| Some(c) != product.category_id()) {
            return false;
        }
        if self.author_id.is_some_and(|a| a != product.author_id()) {
            return false;
        }
        match self.search.as_deref().map(str::to_lowercase) {
            Some(term) => {
                product.name().to_lowercase().contains(&term)
                    || product.description().is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, Error>;
    /// Newest first.
    async fn list_products(&self, query: &ProductQuery) -> Result<Paginated<Product>, Error>;
    /// Inserts or updates a product. Stock is written on insert only; an
    /// existing product's stock moves solely through reserve and release.
    async fn save_product(&self, product: &Product) -> Result<(), Error>;
    /// Decrements stock only if at least `quantity` is available.
    async fn reserve_stock(&self, product_id: Uuid, quantity: u32) -> Result<bool, Error>;
    async fn release_stock(&self, product_id: Uuid, quantity: u32) -> Result<(), Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, Error>;
    async fn list_categories(&self) -> Result<Vec<Category>, Error>;
    async fn save_category(&self, category: &Category) -> Result<(), Error>;
}
