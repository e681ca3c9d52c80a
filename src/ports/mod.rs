//! Ports: the seams between services and infrastructure.
//!
//! Every repository is an object-safe async trait so services can hold
//! `Arc<dyn ..>` handles and tests can swap in `mockall` mocks.

use std::sync::Arc;

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod events;
pub mod order;
pub mod payment;
pub mod returns;
pub mod shipping;
pub mod user;

pub use cart::CartRepository;
pub use catalog::{CategoryRepository, ProductQuery, ProductRepository};
pub use coupon::CouponRepository;
pub use events::{EventPublisher, PublishError};
pub use order::OrderRepository;
pub use payment::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, PaymentRepository};
pub use returns::ReturnRepository;
pub use shipping::ShippingRepository;
pub use user::{AddressRepository, FavoriteRepository, UserRepository};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A unique key (SKU, slug, coupon code, email) is already taken.
    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// Optimistic concurrency check failed; the caller may reload and retry.
    #[error("concurrent modification of {entity} {key}")]
    Conflict { entity: &'static str, key: String },

    /// A value the store cannot represent, such as stock beyond its column range.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },

    /// Concrete adapter errors
    ///
    /// Connectivity, serialization or driver failures that are not part of
    /// the domain model.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

/// One handle per repository, usually all backed by the same store.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub returns: Arc<dyn ReturnRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub users: Arc<dyn UserRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub favorites: Arc<dyn FavoriteRepository>,
    pub shipping: Arc<dyn ShippingRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: S) -> Self
    where
        S: ProductRepository + CategoryRepository + CartRepository + CouponRepository + OrderRepository
            + ReturnRepository + PaymentRepository + UserRepository + AddressRepository + FavoriteRepository
            + ShippingRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            products: store.clone(),
            categories: store.clone(),
            carts: store.clone(),
            coupons: store.clone(),
            orders: store.clone(),
            returns: store.clone(),
            payments: store.clone(),
            users: store.clone(),
            addresses: store.clone(),
            favorites: store.clone(),
            shipping: store,
        }
    }
}
