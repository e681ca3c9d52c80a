use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::{PageRequest, Paginated};
use crate::ports::{FavoriteRepository, ProductRepository};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct FavoriteService {
    favorites: Arc<dyn FavoriteRepository>,
    products: Arc<dyn ProductRepository>,
}

impl FavoriteService {
    pub fn new(favorites: Arc<dyn FavoriteRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { favorites, products }
    }

    /// Adding an existing favorite is a no-op.
    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<()> {
        info!(%user_id, %product_id, "adding favorite");
        match self.products.find_product(product_id).await? {
            Some(p) if p.is_purchasable() => {}
            _ => return Err(EcommerceError::ProductNotFound(product_id)),
        }
        self.favorites.add_favorite(user_id, product_id).await?;
        Ok(())
    }

    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<()> {
        info!(%user_id, %product_id, "removing favorite");
        if !self.favorites.remove_favorite(user_id, product_id).await? {
            return Err(EcommerceError::not_found(format!("Product is not a favorite: {product_id}")));
        }
        Ok(())
    }

    /// Favorites newest first. Products deleted since are skipped; the
    /// total still counts them.
    pub async fn list(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Product>> {
        let ids = self.favorites.list_favorites(user_id, page).await?;
        let mut products = Vec::with_capacity(ids.data.len());
        for id in &ids.data {
            match self.products.find_product(*id).await? {
                Some(product) => products.push(product),
                None => warn!(%user_id, product_id = %id, "favorite product no longer exists"),
            }
        }
        Ok(Paginated { data: products, total: ids.total, page: ids.page, per_page: ids.per_page })
    }
}
