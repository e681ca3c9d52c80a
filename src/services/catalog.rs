use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::aggregates::product::slugify;
use crate::domain::aggregates::{Category, Product, ProductDetails, ProductStatus};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{PageRequest, Paginated, Sku};
use crate::ports::{self, CategoryRepository, EventPublisher, ProductQuery, ProductRepository, UserRepository};
use crate::services::{publish_all, Actor};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct NewProduct {
    /// Generated when absent.
    pub sku: Option<String>,
    /// Selling user; the acting admin when absent.
    pub author_id: Option<Uuid>,
    pub details: ProductDetails,
    pub stock: u32,
    pub publish: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    categories: Arc<dyn CategoryRepository>,
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventPublisher>,
}

impl CatalogService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        categories: Arc<dyn CategoryRepository>,
        users: Arc<dyn UserRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { products, categories, users, events }
    }

    /// Storefront listing; only active products are visible.
    pub async fn list_products(&self, query: ProductQuery) -> Result<Paginated<Product>> {
        let query = ProductQuery { status: Some(ProductStatus::Active), ..query };
        Ok(self.products.list_products(&query).await?)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        match self.products.find_product(id).await? {
            Some(p) if p.is_purchasable() => Ok(p),
            _ => Err(EcommerceError::ProductNotFound(id)),
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.list_categories().await?)
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category> {
        self.categories
            .find_category(id)
            .await?
            .ok_or_else(|| EcommerceError::not_found(format!("Category not found: {id}")))
    }

    pub async fn create_product(&self, admin_id: Uuid, new: NewProduct) -> Result<Product> {
        let author_id = new.author_id.unwrap_or(admin_id);
        info!(%author_id, name = %new.details.name, "creating product");
        let sku = match new.sku.as_deref() {
            Some(raw) => Sku::new(raw).map_err(|e| EcommerceError::bad_request(e.to_string()))?,
            None => Sku::generate(),
        };
        self.check_category(new.details.category_id).await?;
        let company_id = self.users.find_user(author_id).await?.and_then(|u| u.company_id());
        let mut product = Product::create(sku, author_id, company_id, new.details, new.stock)?;
        if new.publish {
            product.publish()?;
        }
        match self.products.save_product(&product).await {
            Ok(()) => {}
            Err(ports::Error::Duplicate { key, .. }) => {
                error!(sku = %key, "duplicate sku");
                return Err(EcommerceError::bad_request(format!("Product SKU already exists: {key}")));
            }
            Err(e) => return Err(e.into()),
        }
        publish_all(self.events.as_ref(), product.take_events()).await;
        Ok(product)
    }

    /// Replaces a product's details; `status` publishes or archives it.
    pub async fn update_product(&self, id: Uuid, details: ProductDetails, status: Option<ProductStatus>) -> Result<Product> {
        info!(product_id = %id, "updating product");
        let mut product = self.load(id).await?;
        self.check_category(details.category_id).await?;
        product.update_details(details)?;
        match status {
            Some(ProductStatus::Active) if product.status() != ProductStatus::Active => product.publish()?,
            Some(ProductStatus::Archived) if product.status() != ProductStatus::Archived => product.archive(),
            Some(ProductStatus::Draft) if product.status() != ProductStatus::Draft => {
                return Err(EcommerceError::bad_request("A published product cannot return to draft"));
            }
            _ => {}
        }
        self.products.save_product(&product).await?;
        publish_all(self.events.as_ref(), product.take_events()).await;
        self.load(id).await
    }

    pub async fn archive_product(&self, id: Uuid) -> Result<Product> {
        info!(product_id = %id, "archiving product");
        let mut product = self.load(id).await?;
        product.archive();
        self.products.save_product(&product).await?;
        publish_all(self.events.as_ref(), product.take_events()).await;
        self.load(id).await
    }

    pub async fn restock(&self, id: Uuid, quantity: u32) -> Result<Product> {
        info!(product_id = %id, quantity, "restocking product");
        if quantity == 0 {
            return Err(EcommerceError::bad_request("Restock quantity must be positive"));
        }
        self.load(id).await?;
        // increment in place; a full save could overwrite a concurrent reservation
        self.products.release_stock(id, quantity).await?;
        let product = self.load(id).await?;
        let event = DomainEvent::Product(ProductEvent::InventoryAdded { product_id: id, quantity });
        publish_all(self.events.as_ref(), vec![event]).await;
        Ok(product)
    }

    /// Every product a seller authored, whatever its status.
    pub async fn list_seller_products(&self, seller_id: Uuid, page: PageRequest) -> Result<Paginated<Product>> {
        let query = ProductQuery { author_id: Some(seller_id), page, ..Default::default() };
        Ok(self.products.list_products(&query).await?)
    }

    pub async fn create_seller_product(&self, seller_id: Uuid, new: NewProduct) -> Result<Product> {
        self.create_product(seller_id, NewProduct { author_id: Some(seller_id), ..new }).await
    }

    pub async fn update_seller_product(
        &self,
        actor: Actor,
        id: Uuid,
        details: ProductDetails,
        status: Option<ProductStatus>,
    ) -> Result<Product> {
        self.owned(actor, id).await?;
        self.update_product(id, details, status).await
    }

    pub async fn archive_seller_product(&self, actor: Actor, id: Uuid) -> Result<Product> {
        self.owned(actor, id).await?;
        self.archive_product(id).await
    }

    async fn owned(&self, actor: Actor, id: Uuid) -> Result<Product> {
        let product = self.load(id).await?;
        if !actor.can_access(product.author_id()) {
            error!(user_id = %actor.user_id, product_id = %id, "product belongs to another seller");
            return Err(EcommerceError::forbidden("User is not authorized to update this product"));
        }
        Ok(product)
    }

    pub async fn create_category(&self, input: CategoryInput) -> Result<Category> {
        info!(name = %input.name, "creating category");
        self.check_name(&input.name)?;
        self.check_category(input.parent_id).await?;
        let category = Category::new(input.name.trim(), input.description, input.parent_id);
        self.ensure_unique_slug(&category).await?;
        self.save_category(&category).await?;
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, input: CategoryInput) -> Result<Category> {
        info!(category_id = %id, name = %input.name, "updating category");
        self.check_name(&input.name)?;
        let mut category = self.get_category(id).await?;
        if input.parent_id == Some(id) {
            return Err(EcommerceError::bad_request("A category cannot be its own parent"));
        }
        self.check_category(input.parent_id).await?;
        category.rename(input.name.trim());
        category.description = input.description;
        category.parent_id = input.parent_id;
        self.ensure_unique_slug(&category).await?;
        self.save_category(&category).await?;
        Ok(category)
    }

    async fn save_category(&self, category: &Category) -> Result<()> {
        match self.categories.save_category(category).await {
            Ok(()) => Ok(()),
            Err(ports::Error::Duplicate { .. }) => Err(duplicate_slug(&category.slug)),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_unique_slug(&self, category: &Category) -> Result<()> {
        let taken = self
            .categories
            .list_categories()
            .await?
            .iter()
            .any(|c| c.id != category.id && c.slug == category.slug);
        if taken {
            error!(slug = %category.slug, "duplicate category slug");
            return Err(duplicate_slug(&category.slug));
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if slugify(name).is_empty() {
            return Err(EcommerceError::bad_request("Category name must not be empty"));
        }
        Ok(())
    }

    async fn check_category(&self, id: Option<Uuid>) -> Result<()> {
        if let Some(id) = id {
            self.get_category(id).await?;
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Product> {
        self.products.find_product(id).await?.ok_or(EcommerceError::ProductNotFound(id))
    }
}

fn duplicate_slug(slug: &str) -> EcommerceError {
    EcommerceError::bad_request(format!("Category already exists: {slug}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LogPublisher, MemoryStore};
    use crate::domain::aggregates::product::fixtures::details;
    use crate::domain::aggregates::ProductError;
    use rust_decimal::Decimal;
    use speculoos::prelude::*;

    fn service() -> CatalogService { service_over(&MemoryStore::new()) }

    fn service_over(store: &MemoryStore) -> CatalogService {
        CatalogService::new(Arc::new(store.clone()), Arc::new(store.clone()), Arc::new(store.clone()), Arc::new(LogPublisher))
    }

    fn new_product(name: &str, price: i64, publish: bool) -> NewProduct {
        NewProduct { sku: None, author_id: None, details: details(name, Decimal::from(price)), stock: 5, publish }
    }

    #[tokio::test]
    async fn test_storefront_shows_only_active() {
        let svc = service();
        let admin = Uuid::new_v4();
        let live = svc.create_product(admin, new_product("Blue Lamp", 30, true)).await.unwrap();
        let draft = svc.create_product(admin, new_product("Red Lamp", 30, false)).await.unwrap();

        let page = svc.list_products(ProductQuery { page: PageRequest::new(None, None), ..Default::default() }).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id(), live.id());
        assert_that!(svc.get_product(draft.id()).await).is_err().matches(|e| matches!(e, EcommerceError::ProductNotFound(_)));

        let query = ProductQuery { search: Some("blue".into()), ..Default::default() };
        assert_eq!(svc.list_products(query).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_product_validation() {
        let svc = service();
        let mut new = new_product("Lamp", 30, true);
        new.details.offer_price = Some(Decimal::from(40));
        let res = svc.create_product(Uuid::new_v4(), new).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Product(ProductError::InvalidOfferPrice)));

        let mut new = new_product("Lamp", 30, true);
        new.details.category_id = Some(Uuid::new_v4());
        let res = svc.create_product(Uuid::new_v4(), new).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_archive_and_restock() {
        let svc = service();
        let product = svc.create_product(Uuid::new_v4(), new_product("Lamp", 30, true)).await.unwrap();
        let restocked = svc.restock(product.id(), 7).await.unwrap();
        assert_eq!(restocked.stock().value(), 12);
        let archived = svc.archive_product(product.id()).await.unwrap();
        assert_eq!(archived.status(), ProductStatus::Archived);
        assert_that!(svc.get_product(product.id()).await).is_err();
    }

    #[tokio::test]
    async fn test_detail_update_keeps_reserved_stock() {
        let store = MemoryStore::new();
        let svc = service_over(&store);
        let product = svc.create_product(Uuid::new_v4(), new_product("Lamp", 30, true)).await.unwrap();
        assert!(store.reserve_stock(product.id(), 2).await.unwrap());

        let updated = svc.update_product(product.id(), details("Desk Lamp", Decimal::from(35)), None).await.unwrap();
        assert_eq!(updated.name(), "Desk Lamp");
        assert_eq!(updated.stock().value(), 3);
        let archived = svc.archive_product(product.id()).await.unwrap();
        assert_eq!(archived.stock().value(), 3);
    }

    #[tokio::test]
    async fn test_seller_manages_own_products() {
        let svc = service();
        let seller = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = svc.create_seller_product(seller, NewProduct { author_id: Some(other), ..new_product("Lamp", 30, false) }).await.unwrap();
        assert_eq!(mine.author_id(), seller);
        svc.create_seller_product(other, new_product("Desk", 90, true)).await.unwrap();

        let page = svc.list_seller_products(seller, PageRequest::new(None, None)).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id(), mine.id());

        let res = svc.update_seller_product(Actor::buyer(other), mine.id(), details("Stolen", Decimal::ONE), None).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Forbidden(m) if m == "User is not authorized to update this product"));
        let res = svc.archive_seller_product(Actor::buyer(other), mine.id()).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Forbidden(_)));

        let published = svc
            .update_seller_product(Actor::buyer(seller), mine.id(), details("Lamp", Decimal::from(28)), Some(ProductStatus::Active))
            .await
            .unwrap();
        assert_eq!(published.status(), ProductStatus::Active);
        let archived = svc.archive_seller_product(Actor::admin(Uuid::new_v4()), mine.id()).await.unwrap();
        assert_eq!(archived.status(), ProductStatus::Archived);
    }

    #[tokio::test]
    async fn test_duplicate_category_slug() {
        let svc = service();
        let home = svc.create_category(CategoryInput { name: "Home Office".into(), description: None, parent_id: None }).await.unwrap();
        assert_eq!(home.slug, "home-office");
        let res = svc.create_category(CategoryInput { name: "home  office".into(), description: None, parent_id: None }).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::BadRequest(_)));

        let desks = svc
            .create_category(CategoryInput { name: "Desks".into(), description: None, parent_id: Some(home.id) })
            .await
            .unwrap();
        let res = svc.update_category(desks.id, CategoryInput { name: "Home Office".into(), description: None, parent_id: None }).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::BadRequest(_)));
        let renamed = svc
            .update_category(desks.id, CategoryInput { name: "Standing Desks".into(), description: None, parent_id: Some(home.id) })
            .await
            .unwrap();
        assert_eq!(renamed.slug, "standing-desks");
    }
}
