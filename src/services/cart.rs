use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartError, CartOwner, Product};
use crate::domain::pricing::{CartTotals, PricedItem};
use crate::domain::value_objects::{Quantity, SessionId};
use crate::ports::{CartRepository, ProductRepository, UserRepository};
use crate::services::CouponService;
use crate::{EcommerceError, Result};

/// Result of applying a coupon to a cart.
#[derive(Clone, Debug)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: Decimal,
    pub cart: Cart,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
    coupons: CouponService,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        products: Arc<dyn ProductRepository>,
        users: Arc<dyn UserRepository>,
        coupons: CouponService,
    ) -> Self {
        Self { carts, products, users, coupons }
    }

    /// Existing cart with fresh totals, or an empty unsaved one.
    pub async fn get_cart(&self, owner: &CartOwner) -> Result<Cart> {
        let mut cart = self.load_or_new(owner).await?;
        self.refresh_totals(&mut cart).await?;
        Ok(cart)
    }

    pub async fn add_item(&self, owner: &CartOwner, product_id: Uuid, quantity: i64) -> Result<Cart> {
        info!(%owner, %product_id, quantity, "adding item to cart");
        let quantity = u32::try_from(quantity).ok().filter(|q| *q > 0).ok_or_else(|| {
            error!(%owner, quantity, "invalid quantity");
            CartError::InvalidQuantity
        })?;
        let product = self.purchasable_product(product_id).await?;
        let mut cart = self.load_or_new(owner).await?;
        if let Err(err) = cart.add_item(product_id, quantity, product.stock()) {
            error!(%owner, %product_id, error = %err, "cannot add item");
            return Err(err.into());
        }
        self.save(&mut cart).await?;
        Ok(cart)
    }

    /// Sets an item's quantity; zero or less removes it.
    pub async fn update_item(&self, owner: &CartOwner, item_id: Uuid, quantity: i64) -> Result<Cart> {
        info!(%owner, %item_id, quantity, "updating cart item");
        let mut cart = self.load_or_new(owner).await?;
        let product_id = cart.item(item_id).map(|i| i.product_id).ok_or(CartError::ItemNotFound(item_id))?;
        let available = match self.products.find_product(product_id).await? {
            Some(product) => product.stock(),
            None => Quantity::default(),
        };
        cart.update_quantity(item_id, quantity, available)?;
        self.save(&mut cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, owner: &CartOwner, item_id: Uuid) -> Result<Cart> {
        info!(%owner, %item_id, "removing cart item");
        let mut cart = self.load_or_new(owner).await?;
        cart.remove_item(item_id)?;
        self.save(&mut cart).await?;
        Ok(cart)
    }

    pub async fn clear_cart(&self, owner: &CartOwner) -> Result<Cart> {
        info!(%owner, "clearing cart");
        let mut cart = self.load_or_new(owner).await?;
        cart.clear();
        self.save(&mut cart).await?;
        Ok(cart)
    }

    pub async fn apply_coupon(&self, owner: &CartOwner, code: &str) -> Result<AppliedCoupon> {
        info!(%owner, %code, "applying coupon");
        let mut cart = self.load_or_new(owner).await?;
        let items = self.price_items(&cart).await?;
        let coupon = self.coupons.validate_for(code, owner.user_id(), &items).await?;
        cart.apply_coupon(coupon.code());
        self.save(&mut cart).await?;
        Ok(AppliedCoupon { code: coupon.code().to_string(), discount: cart.totals().discount, cart })
    }

    pub async fn remove_coupon(&self, owner: &CartOwner) -> Result<Cart> {
        info!(%owner, "removing coupon");
        let mut cart = self.load_or_new(owner).await?;
        cart.remove_coupon();
        self.save(&mut cart).await?;
        Ok(cart)
    }

    /// Folds the anonymous cart for `session_id` into the user's cart and
    /// deletes it. Lines whose product is gone or no longer on sale, or whose
    /// merged quantity would exceed stock, are dropped.
    pub async fn merge_on_login(&self, session_id: &SessionId, user_id: Uuid) -> Result<Cart> {
        info!(%session_id, %user_id, "merging cart on login");
        if self.users.find_user(user_id).await?.filter(|u| !u.is_deleted()).is_none() {
            error!(%user_id, "user not found for cart merge");
            return Err(EcommerceError::not_found(format!("User not found: {user_id}")));
        }
        let user_owner = CartOwner::User(user_id);
        let session_owner = CartOwner::Session(session_id.clone());
        let mut cart = self.load_or_new(&user_owner).await?;
        let Some(anonymous) = self.carts.find_cart(&session_owner).await? else {
            self.refresh_totals(&mut cart).await?;
            return Ok(cart);
        };

        for item in anonymous.items() {
            let Some(product) = self.products.find_product(item.product_id).await? else {
                warn!(product_id = %item.product_id, "skipping product during merge, not found");
                continue;
            };
            if !product.is_purchasable() {
                warn!(product_id = %item.product_id, status = %product.status().as_str(), "skipping product during merge, not purchasable");
                continue;
            }
            if !cart.merge_item(item.product_id, item.quantity, product.stock()) {
                warn!(product_id = %item.product_id, available = product.stock().value(), "skipping product during merge, insufficient stock");
            }
        }

        if let Some(code) = anonymous.coupon_code() {
            let items = self.price_items(&cart).await?;
            match self.coupons.validate_for(code, Some(user_id), &items).await {
                Ok(coupon) => cart.apply_coupon(coupon.code()),
                Err(EcommerceError::Coupon(err)) => warn!(%code, error = %err, "dropping coupon from anonymous cart"),
                Err(e) => return Err(e),
            }
        }

        self.carts.delete_cart(&session_owner).await?;
        self.save(&mut cart).await?;
        Ok(cart)
    }

    /// Deletes anonymous carts untouched for `days`.
    pub async fn cleanup_stale_carts(&self, days: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(days);
        let removed = self.carts.delete_stale_session_carts(cutoff).await?;
        info!(removed, %cutoff, "stale anonymous carts removed");
        Ok(removed)
    }

    /// Prices the cart's lines, skipping those whose product no longer exists.
    pub(crate) async fn price_items(&self, cart: &Cart) -> Result<Vec<PricedItem>> {
        let mut items = Vec::with_capacity(cart.item_count());
        for item in cart.items() {
            match self.products.find_product(item.product_id).await? {
                Some(product) => items.push(PricedItem::new(item.id, &product, item.quantity)),
                None => warn!(product_id = %item.product_id, "cart references missing product"),
            }
        }
        Ok(items)
    }

    pub(crate) async fn refresh_totals(&self, cart: &mut Cart) -> Result<()> {
        let items = self.price_items(cart).await?;
        let mut totals = CartTotals::compute(&items, None);
        if let Some(code) = cart.coupon_code() {
            totals.discount = self.coupons.discount_for(code, cart.owner().user_id(), &items).await?;
            totals.total = (totals.subtotal + totals.shipping - totals.discount).max(Decimal::ZERO);
        }
        cart.set_totals(totals);
        Ok(())
    }

    pub(crate) async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        Ok(self.carts.find_cart(owner).await?)
    }

    pub(crate) async fn save(&self, cart: &mut Cart) -> Result<()> {
        self.refresh_totals(cart).await?;
        self.carts.save_cart(cart).await?;
        Ok(())
    }

    async fn load_or_new(&self, owner: &CartOwner) -> Result<Cart> {
        Ok(self.carts.find_cart(owner).await?.unwrap_or_else(|| Cart::new(owner.clone())))
    }

    async fn purchasable_product(&self, product_id: Uuid) -> Result<Product> {
        match self.products.find_product(product_id).await? {
            Some(p) if p.is_purchasable() => Ok(p),
            _ => {
                error!(%product_id, "product not found");
                Err(EcommerceError::ProductNotFound(product_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::fixtures::{new_coupon, percent};
    use crate::domain::aggregates::CouponError;
    use crate::ports::CartRepository as _;
    use crate::services::testing::Harness;
    use speculoos::prelude::*;

    fn session() -> CartOwner { CartOwner::Session(SessionId::generate()) }

    #[tokio::test]
    async fn test_add_item_prices_cart() {
        let h = Harness::new();
        let product = h.product(Uuid::nil(), 25, 10).await;
        let owner = session();
        let cart = h.services.carts.add_item(&owner, product.id(), 2).await.unwrap();
        assert_eq!(cart.totals().subtotal, Decimal::from(50));
        assert_eq!(cart.totals().total, Decimal::from(50));
        // persisted
        assert_that!(h.store.find_cart(&owner).await).is_ok().is_some();
    }

    #[tokio::test]
    async fn test_add_item_rejects_bad_quantity_and_unknown_product() {
        let h = Harness::new();
        let owner = session();
        let res = h.services.carts.add_item(&owner, Uuid::new_v4(), 0).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Cart(CartError::InvalidQuantity)));
        let res = h.services.carts.add_item(&owner, Uuid::new_v4(), 1).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_add_item_over_stock() {
        let h = Harness::new();
        let product = h.product(Uuid::nil(), 5, 2).await;
        let owner = session();
        h.services.carts.add_item(&owner, product.id(), 2).await.unwrap();
        let res = h.services.carts.add_item(&owner, product.id(), 1).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Cart(CartError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let h = Harness::new();
        let product = h.product(Uuid::nil(), 5, 10).await;
        let owner = session();
        let cart = h.services.carts.add_item(&owner, product.id(), 1).await.unwrap();
        let item_id = cart.items()[0].id;
        let cart = h.services.carts.update_item(&owner, item_id, 4).await.unwrap();
        assert_eq!(cart.totals().subtotal, Decimal::from(20));
        let cart = h.services.carts.update_item(&owner, item_id, 0).await.unwrap();
        assert!(cart.is_empty());
        let res = h.services.carts.remove_item(&owner, item_id).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Cart(CartError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_coupon_discounts_total() {
        let h = Harness::new();
        let product = h.product(Uuid::nil(), 40, 10).await;
        h.services.coupons.create_coupon(Uuid::nil(), new_coupon("TENOFF", percent(10))).await.unwrap();
        let owner = session();
        h.services.carts.add_item(&owner, product.id(), 1).await.unwrap();

        let applied = h.services.carts.apply_coupon(&owner, "tenoff").await.unwrap();
        assert_eq!(applied.code, "TENOFF");
        assert_eq!(applied.discount, Decimal::from(4));
        assert_eq!(applied.cart.totals().total, Decimal::from(36));

        let cart = h.services.carts.remove_coupon(&owner).await.unwrap();
        assert_eq!(cart.totals().discount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_coupon_from_other_seller_rejected() {
        let h = Harness::new();
        let product = h.product(Uuid::new_v4(), 40, 10).await;
        h.services.coupons.create_coupon(Uuid::nil(), new_coupon("OTHER", percent(10))).await.unwrap();
        let owner = session();
        h.services.carts.add_item(&owner, product.id(), 1).await.unwrap();
        let res = h.services.carts.apply_coupon(&owner, "OTHER").await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::Coupon(CouponError::WrongSeller(_))));
    }

    #[tokio::test]
    async fn test_merge_on_login() {
        let h = Harness::new();
        let user = h.user("buyer@example.com").await;
        let shared = h.product(Uuid::nil(), 10, 3).await;
        let only_anon = h.product(Uuid::nil(), 7, 5).await;
        h.services.coupons.create_coupon(Uuid::nil(), new_coupon("WELCOME", percent(10))).await.unwrap();

        let session_id = SessionId::generate();
        let anon = CartOwner::Session(session_id.clone());
        h.services.carts.add_item(&anon, shared.id(), 2).await.unwrap();
        h.services.carts.add_item(&anon, only_anon.id(), 1).await.unwrap();
        h.services.carts.apply_coupon(&anon, "WELCOME").await.unwrap();

        let mine = CartOwner::User(user.id());
        h.services.carts.add_item(&mine, shared.id(), 2).await.unwrap();

        let merged = h.services.carts.merge_on_login(&session_id, user.id()).await.unwrap();
        // 2 + 2 exceeds stock of 3, so the shared line keeps the user's quantity
        assert_eq!(merged.item_for_product(shared.id()).map(|i| i.quantity), Some(2));
        assert_eq!(merged.item_for_product(only_anon.id()).map(|i| i.quantity), Some(1));
        assert_eq!(merged.coupon_code(), Some("WELCOME"));
        assert_eq!(merged.totals().discount, Decimal::new(27, 1));
        assert_that!(h.store.find_cart(&anon).await).is_ok().is_none();
    }

    #[tokio::test]
    async fn test_merge_drops_products_taken_off_sale() {
        let h = Harness::new();
        let user = h.user("buyer@example.com").await;
        let live = h.product(Uuid::nil(), 10, 3).await;
        let retired = h.product(Uuid::nil(), 12, 3).await;
        let session_id = SessionId::generate();
        let anon = CartOwner::Session(session_id.clone());
        h.services.carts.add_item(&anon, live.id(), 1).await.unwrap();
        h.services.carts.add_item(&anon, retired.id(), 1).await.unwrap();
        h.services.catalog.archive_product(retired.id()).await.unwrap();

        let merged = h.services.carts.merge_on_login(&session_id, user.id()).await.unwrap();
        assert_eq!(merged.items().len(), 1);
        assert_that!(merged.item_for_product(retired.id())).is_none();
        assert_eq!(merged.totals().subtotal, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_merge_unknown_user() {
        let h = Harness::new();
        let res = h.services.carts.merge_on_login(&SessionId::generate(), Uuid::new_v4()).await;
        assert_that!(res).is_err().matches(|e| matches!(e, EcommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cleanup_stale_carts() {
        let h = Harness::new();
        let product = h.product(Uuid::nil(), 10, 3).await;
        h.services.carts.add_item(&session(), product.id(), 1).await.unwrap();
        assert_eq!(h.services.carts.cleanup_stale_carts(90).await.unwrap(), 0);
    }
}
