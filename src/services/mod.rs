//! Application services: one per use-case area, each holding the ports it
//! needs. Services validate, call repositories, publish events and log.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::PricingConfig;
use crate::domain::events::DomainEvent;
use crate::ports::{EventPublisher, PaymentGateway, Repositories};

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod favorites;
pub mod order;
pub mod payment;
pub mod returns;
pub mod shipping;
pub mod users;

pub use addresses::AddressService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use coupon::CouponService;
pub use favorites::FavoriteService;
pub use order::{CheckoutCommand, OrderService};
pub use payment::{PaymentService, ProcessPayment};
pub use returns::{CreateReturn, ReturnService};
pub use shipping::ShippingService;
pub use users::{Profile, ProfileSummary, UserService};

/// The authenticated caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn buyer(user_id: Uuid) -> Self { Self { user_id, is_admin: false } }
    pub fn admin(user_id: Uuid) -> Self { Self { user_id, is_admin: true } }
    pub fn can_access(&self, owner_id: Uuid) -> bool { self.is_admin || self.user_id == owner_id }
}

/// Publishes events one by one. Failures are logged and never surface to the caller.
pub(crate) async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in events {
        if let Err(err) = publisher.publish(&event).await {
            tracing::warn!(subject = %event.subject(), error = %err, "failed to publish event");
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub coupons: CouponService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub returns: ReturnService,
    pub users: UserService,
    pub addresses: AddressService,
    pub favorites: FavoriteService,
    pub shipping: ShippingService,
}

impl Services {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        pricing: PricingConfig,
    ) -> Self {
        let coupons = CouponService::new(repos.coupons.clone(), repos.users.clone(), events.clone());
        let carts = CartService::new(repos.carts.clone(), repos.products.clone(), repos.users.clone(), coupons.clone());
        let addresses = AddressService::new(repos.addresses.clone());
        let orders = OrderService::new(
            repos.orders.clone(),
            repos.products.clone(),
            carts.clone(),
            coupons.clone(),
            addresses.clone(),
            events.clone(),
            pricing.vat_rate,
        );
        let payments = PaymentService::new(
            repos.payments.clone(),
            repos.orders.clone(),
            repos.returns.clone(),
            gateway,
            events.clone(),
            pricing.currency,
        );
        Self {
            catalog: CatalogService::new(repos.products.clone(), repos.categories.clone(), repos.users.clone(), events.clone()),
            returns: ReturnService::new(repos.returns.clone(), repos.orders.clone(), events.clone()),
            favorites: FavoriteService::new(repos.favorites.clone(), repos.products.clone()),
            shipping: ShippingService::new(repos.shipping.clone(), repos.orders.clone(), events),
            users: UserService::new(repos.users),
            carts,
            coupons,
            orders,
            payments,
            addresses,
        }
    }
}
