//! In-process store backing every repository port.
//!
//! Used when no database is configured and throughout the test suite. All
//! tables sit behind one mutex so multi-row writes (default addresses, stock
//! reservation) are atomic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{
    Address, Cart, CartOwner, Category, Coupon, Follow, Order, OrderShipping, Payment, Product, ReturnRequest, User,
};
use crate::domain::value_objects::{PageRequest, Paginated};
use crate::ports::{
    AddressRepository, CartRepository, CategoryRepository, CouponRepository, Error, FavoriteRepository,
    OrderRepository, PaymentRepository, ProductQuery, ProductRepository, ReturnRepository, ShippingRepository,
    UserRepository,
};

#[derive(Default, Debug)]
struct Tables {
    products: HashMap<Uuid, Product>,
    categories: HashMap<Uuid, Category>,
    carts: HashMap<CartOwner, Cart>,
    coupons: HashMap<String, Coupon>,
    orders: HashMap<Uuid, Order>,
    returns: HashMap<Uuid, ReturnRequest>,
    payments: HashMap<Uuid, Payment>,
    users: HashMap<Uuid, User>,
    follows: Vec<Follow>,
    addresses: HashMap<Uuid, Address>,
    /// (user, product) pairs in insertion order.
    favorites: Vec<(Uuid, Uuid)>,
    shipping: HashMap<Uuid, OrderShipping>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, Error> {
        Ok(self.tables.lock()?)
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not `Send`, so
/// only the message is kept.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Paginated<T> {
    Paginated::new(page.slice(items), items.len() as i64, page)
}

#[async_trait::async_trait]
impl ProductRepository for MemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, Error> {
        Ok(self.lock()?.products.get(&id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Paginated<Product>, Error> {
        let tables = self.lock()?;
        let mut matching: Vec<Product> = tables.products.values().filter(|p| query.matches(p)).cloned().collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(paginate(&matching, query.page))
    }

    async fn save_product(&self, product: &Product) -> Result<(), Error> {
        let mut tables = self.lock()?;
        let taken = tables.products.values().any(|p| p.sku() == product.sku() && p.id() != product.id());
        if taken {
            return Err(Error::Duplicate { entity: "product sku", key: product.sku().to_string() });
        }
        let mut stored = product.clone();
        if let Some(existing) = tables.products.get(&product.id()) {
            stored.set_stock(existing.stock());
        }
        tables.products.insert(product.id(), stored);
        Ok(())
    }

    async fn reserve_stock(&self, product_id: Uuid, quantity: u32) -> Result<bool, Error> {
        let mut tables = self.lock()?;
        let Some(product) = tables.products.get_mut(&product_id) else { return Ok(false) };
        if product.remove_inventory(quantity).is_err() {
            return Ok(false);
        }
        product.take_events();
        Ok(true)
    }

    async fn release_stock(&self, product_id: Uuid, quantity: u32) -> Result<(), Error> {
        if let Some(product) = self.lock()?.products.get_mut(&product_id) {
            product.add_inventory(quantity);
            product.take_events();
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CategoryRepository for MemoryStore {
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, Error> {
        Ok(self.lock()?.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, Error> {
        let mut categories: Vec<Category> = self.lock()?.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn save_category(&self, category: &Category) -> Result<(), Error> {
        let mut tables = self.lock()?;
        if tables.categories.values().any(|c| c.slug == category.slug && c.id != category.id) {
            return Err(Error::Duplicate { entity: "category slug", key: category.slug.clone() });
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl CartRepository for MemoryStore {
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, Error> {
        Ok(self.lock()?.carts.get(owner).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), Error> {
        self.lock()?.carts.insert(cart.owner().clone(), cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, owner: &CartOwner) -> Result<(), Error> {
        self.lock()?.carts.remove(owner);
        Ok(())
    }

    async fn delete_stale_session_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let mut tables = self.lock()?;
        let before = tables.carts.len();
        tables.carts.retain(|owner, cart| owner.session_id().is_none() || cart.updated_at() >= cutoff);
        Ok((before - tables.carts.len()) as u64)
    }
}

#[async_trait::async_trait]
impl CouponRepository for MemoryStore {
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, Error> {
        Ok(self.lock()?.coupons.get(&code.to_uppercase()).cloned())
    }

    async fn list_coupons_by_author(&self, author_id: Uuid) -> Result<Vec<Coupon>, Error> {
        let mut coupons: Vec<Coupon> =
            self.lock()?.coupons.values().filter(|c| c.author_id() == author_id).cloned().collect();
        coupons.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(coupons)
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), Error> {
        let mut tables = self.lock()?;
        if tables.coupons.contains_key(coupon.code()) {
            return Err(Error::Duplicate { entity: "coupon", key: coupon.code().to_string() });
        }
        tables.coupons.insert(coupon.code().to_string(), coupon.clone());
        Ok(())
    }

    async fn update_coupon(&self, coupon: &Coupon) -> Result<Coupon, Error> {
        let mut tables = self.lock()?;
        let conflict = || Error::Conflict { entity: "coupon", key: coupon.code().to_string() };
        let stored = tables.coupons.get_mut(coupon.code()).ok_or_else(conflict)?;
        if stored.version() != coupon.version() {
            return Err(conflict());
        }
        let mut updated = coupon.clone();
        updated.set_version(coupon.version() + 1);
        *stored = updated.clone();
        Ok(updated)
    }
}

#[async_trait::async_trait]
impl OrderRepository for MemoryStore {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, Error> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    async fn list_orders_by_buyer(&self, buyer_id: Uuid, page: PageRequest) -> Result<Paginated<Order>, Error> {
        let mut orders: Vec<Order> =
            self.lock()?.orders.values().filter(|o| o.buyer_id() == buyer_id).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(paginate(&orders, page))
    }

    async fn list_orders(&self, page: PageRequest) -> Result<Paginated<Order>, Error> {
        let mut orders: Vec<Order> = self.lock()?.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(paginate(&orders, page))
    }

    async fn save_order(&self, order: &Order) -> Result<(), Error> {
        self.lock()?.orders.insert(order.id(), order.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReturnRepository for MemoryStore {
    async fn find_return(&self, id: Uuid) -> Result<Option<ReturnRequest>, Error> {
        Ok(self.lock()?.returns.get(&id).cloned())
    }

    async fn list_returns_by_order(&self, order_id: Uuid) -> Result<Vec<ReturnRequest>, Error> {
        let mut returns: Vec<ReturnRequest> =
            self.lock()?.returns.values().filter(|r| r.order_id() == order_id).cloned().collect();
        returns.sort_by_key(|r| r.requested_at());
        Ok(returns)
    }

    async fn save_return(&self, request: &ReturnRequest) -> Result<(), Error> {
        self.lock()?.returns.insert(request.id(), request.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl PaymentRepository for MemoryStore {
    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>, Error> {
        Ok(self.lock()?.payments.values().find(|p| p.transaction_id() == transaction_id).cloned())
    }

    async fn list_payments_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>, Error> {
        let mut payments: Vec<Payment> =
            self.lock()?.payments.values().filter(|p| p.order_id() == order_id).cloned().collect();
        payments.sort_by_key(|p| p.id());
        Ok(payments)
    }

    async fn save_payment(&self, payment: &Payment) -> Result<(), Error> {
        self.lock()?.payments.insert(payment.id(), payment.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let email = email.trim().to_lowercase();
        Ok(self.lock()?.users.values().find(|u| u.email() == email).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), Error> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.email() == user.email() && u.id() != user.id()) {
            return Err(Error::Duplicate { entity: "user email", key: user.email().to_string() });
        }
        tables.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn follow_exists(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, Error> {
        Ok(self.lock()?.follows.iter().any(|f| f.follower_id == follower_id && f.followed_id == followed_id))
    }

    async fn insert_follow(&self, follow: &Follow) -> Result<(), Error> {
        let mut tables = self.lock()?;
        if tables.follows.iter().any(|f| f.follower_id == follow.follower_id && f.followed_id == follow.followed_id) {
            return Err(Error::Duplicate { entity: "follow", key: format!("{}->{}", follow.follower_id, follow.followed_id) });
        }
        tables.follows.push(*follow);
        Ok(())
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, Error> {
        let mut tables = self.lock()?;
        let before = tables.follows.len();
        tables.follows.retain(|f| !(f.follower_id == follower_id && f.followed_id == followed_id));
        Ok(tables.follows.len() != before)
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<i64, Error> {
        Ok(self.lock()?.follows.iter().filter(|f| f.followed_id == user_id).count() as i64)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64, Error> {
        Ok(self.lock()?.follows.iter().filter(|f| f.follower_id == user_id).count() as i64)
    }

    async fn list_followers(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error> {
        let tables = self.lock()?;
        let mut edges: Vec<&Follow> = tables.follows.iter().filter(|f| f.followed_id == user_id).collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let ids: Vec<Uuid> = edges.into_iter().map(|f| f.follower_id).collect();
        Ok(paginate(&ids, page))
    }

    async fn list_following(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error> {
        let tables = self.lock()?;
        let mut edges: Vec<&Follow> = tables.follows.iter().filter(|f| f.follower_id == user_id).collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let ids: Vec<Uuid> = edges.into_iter().map(|f| f.followed_id).collect();
        Ok(paginate(&ids, page))
    }
}

#[async_trait::async_trait]
impl AddressRepository for MemoryStore {
    async fn find_address(&self, id: Uuid) -> Result<Option<Address>, Error> {
        Ok(self.lock()?.addresses.get(&id).cloned())
    }

    async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<Address>, Error> {
        let mut addresses: Vec<Address> =
            self.lock()?.addresses.values().filter(|a| a.user_id == user_id).cloned().collect();
        addresses.sort_by_key(|a| (!a.is_default, a.created_at));
        Ok(addresses)
    }

    async fn save_address(&self, address: &Address) -> Result<(), Error> {
        let mut tables = self.lock()?;
        if address.is_default {
            for other in tables.addresses.values_mut() {
                if other.id != address.id && other.user_id == address.user_id && other.address_type == address.address_type {
                    other.is_default = false;
                }
            }
        }
        tables.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn delete_address(&self, id: Uuid) -> Result<(), Error> {
        self.lock()?.addresses.remove(&id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FavoriteRepository for MemoryStore {
    async fn add_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, Error> {
        let mut tables = self.lock()?;
        if tables.favorites.contains(&(user_id, product_id)) {
            return Ok(false);
        }
        tables.favorites.push((user_id, product_id));
        Ok(true)
    }

    async fn remove_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, Error> {
        let mut tables = self.lock()?;
        let before = tables.favorites.len();
        tables.favorites.retain(|f| *f != (user_id, product_id));
        Ok(tables.favorites.len() != before)
    }

    async fn list_favorites(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error> {
        let tables = self.lock()?;
        let ids: Vec<Uuid> = tables.favorites.iter().rev().filter(|(u, _)| *u == user_id).map(|(_, p)| *p).collect();
        Ok(paginate(&ids, page))
    }
}

#[async_trait::async_trait]
impl ShippingRepository for MemoryStore {
    async fn find_shipping(&self, order_id: Uuid) -> Result<Option<OrderShipping>, Error> {
        Ok(self.lock()?.shipping.get(&order_id).cloned())
    }

    async fn insert_shipping(&self, shipping: &OrderShipping) -> Result<(), Error> {
        let mut tables = self.lock()?;
        if tables.shipping.contains_key(&shipping.order_id()) {
            return Err(Error::Duplicate { entity: "order shipping", key: shipping.order_id().to_string() });
        }
        tables.shipping.insert(shipping.order_id(), shipping.clone());
        Ok(())
    }

    async fn update_shipping(&self, shipping: &OrderShipping) -> Result<(), Error> {
        self.lock()?.shipping.insert(shipping.order_id(), shipping.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::fixtures::{new_coupon, percent};
    use crate::domain::aggregates::product::fixtures::active_product;
    use crate::domain::aggregates::{AddressDetails, AddressType};
    use crate::domain::value_objects::SessionId;
    use rust_decimal::Decimal;
    use speculoos::prelude::*;

    #[tokio::test]
    async fn test_reserve_and_release_stock() {
        let store = MemoryStore::new();
        let product = active_product(Uuid::new_v4(), Decimal::from(10), 3);
        store.save_product(&product).await.unwrap();

        assert_that!(store.reserve_stock(product.id(), 2).await).is_ok().is_true();
        assert_that!(store.reserve_stock(product.id(), 2).await).is_ok().is_false();
        store.release_stock(product.id(), 2).await.unwrap();
        let stored = store.find_product(product.id()).await.unwrap().unwrap();
        assert_eq!(stored.stock().value(), 3);
    }

    #[tokio::test]
    async fn test_saving_stale_product_keeps_stock() {
        let store = MemoryStore::new();
        let mut stale = active_product(Uuid::new_v4(), Decimal::from(10), 5);
        store.save_product(&stale).await.unwrap();
        assert!(store.reserve_stock(stale.id(), 2).await.unwrap());

        stale.archive();
        store.save_product(&stale).await.unwrap();
        let stored = store.find_product(stale.id()).await.unwrap().unwrap();
        assert_eq!(stored.stock().value(), 3);
        assert!(!stored.is_purchasable());
    }

    #[tokio::test]
    async fn test_coupon_version_conflict() {
        let store = MemoryStore::new();
        let coupon = Coupon::create(new_coupon("CAS", percent(10)), Uuid::new_v4(), None).unwrap();
        store.insert_coupon(&coupon).await.unwrap();

        let updated = store.update_coupon(&coupon).await.unwrap();
        assert_eq!(updated.version(), 1);
        // stale copy still at version 0
        let res = store.update_coupon(&coupon).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::Conflict { .. }));
        assert_that!(store.insert_coupon(&coupon).await).is_err().matches(|e| matches!(e, Error::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_stale_session_carts() {
        let store = MemoryStore::new();
        let anon = Cart::new(CartOwner::Session(SessionId::generate()));
        let user = Cart::new(CartOwner::User(Uuid::new_v4()));
        store.save_cart(&anon).await.unwrap();
        store.save_cart(&user).await.unwrap();

        let removed = store.delete_stale_session_carts(Utc::now() + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_that!(store.find_cart(anon.owner()).await).is_ok().is_none();
        assert_that!(store.find_cart(user.owner()).await).is_ok().is_some();
    }

    #[tokio::test]
    async fn test_single_default_address_per_type() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let details = |address_type| AddressDetails {
            address_type, recipient: "Ann".into(), line1: "1 Main St".into(), line2: None, city: "Lyon".into(),
            postal_code: "69001".into(), country: "fr".into(), phone: None,
        };
        let first = Address::new(user_id, details(AddressType::Shipping), true);
        let billing = Address::new(user_id, details(AddressType::Billing), true);
        let second = Address::new(user_id, details(AddressType::Shipping), true);
        for a in [&first, &billing, &second] {
            store.save_address(a).await.unwrap();
        }

        let listed = store.list_addresses(user_id).await.unwrap();
        let defaults: Vec<Uuid> = listed.iter().filter(|a| a.is_default).map(|a| a.id).collect();
        assert_eq!(defaults.len(), 2);
        assert!(defaults.contains(&second.id) && defaults.contains(&billing.id));
        assert!(!listed.iter().any(|a| a.id == first.id && a.is_default));
    }
}
