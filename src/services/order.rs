use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{AddressType, CartError, CartItem, CartOwner, Order, OrderItem, OrderStatus};
use crate::domain::pricing::{self, OrderTotals, PricedItem};
use crate::domain::value_objects::{PageRequest, Paginated};
use crate::ports::{EventPublisher, OrderRepository, ProductRepository};
use crate::services::{publish_all, Actor, AddressService, CartService, CouponService};
use crate::{EcommerceError, Result};

/// Buyer request to turn (part of) their cart into an order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutCommand {
    /// Cart item ids to buy; the whole cart when absent.
    pub selected_item_ids: Option<Vec<Uuid>>,
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    carts: CartService,
    coupons: CouponService,
    addresses: AddressService,
    events: Arc<dyn EventPublisher>,
    vat_rate: Decimal,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        carts: CartService,
        coupons: CouponService,
        addresses: AddressService,
        events: Arc<dyn EventPublisher>,
        vat_rate: Decimal,
    ) -> Self {
        Self { orders, products, carts, coupons, addresses, events, vat_rate }
    }

    pub async fn checkout(&self, buyer_id: Uuid, command: CheckoutCommand) -> Result<Order> {
        info!(%buyer_id, "creating order from cart");
        let owner = CartOwner::User(buyer_id);
        let mut cart = self.carts.find(&owner).await?.ok_or_else(|| {
            error!(%buyer_id, "cart not found for checkout");
            EcommerceError::CartNotFound
        })?;
        if cart.is_empty() {
            return Err(EcommerceError::bad_request("Cart is empty"));
        }

        let selected: Vec<CartItem> = match &command.selected_item_ids {
            Some(ids) => cart.items().iter().filter(|i| ids.contains(&i.id)).cloned().collect(),
            None => cart.items().to_vec(),
        };
        if selected.is_empty() {
            error!(%buyer_id, "no valid items selected for checkout");
            return Err(EcommerceError::bad_request("No valid items selected for checkout."));
        }

        let mut priced = Vec::with_capacity(selected.len());
        let mut lines = Vec::with_capacity(selected.len());
        for item in &selected {
            let product = match self.products.find_product(item.product_id).await? {
                Some(p) if p.is_purchasable() => p,
                _ => return Err(EcommerceError::ProductNotFound(item.product_id)),
            };
            if !product.stock().covers(item.quantity) {
                return Err(CartError::InsufficientStock {
                    product_id: product.id(),
                    requested: item.quantity,
                    available: product.stock().value(),
                }
                .into());
            }
            priced.push(PricedItem::new(item.id, &product, item.quantity));
            lines.push(OrderItem {
                id: Uuid::now_v7(),
                product_id: product.id(),
                product_name: product.name().to_string(),
                seller_id: product.author_id(),
                unit_price: product.effective_price(),
                quantity: item.quantity,
            });
        }

        let coupon_code = cart.coupon_code().map(str::to_string);
        let discount = match &coupon_code {
            Some(code) => {
                let coupon = self.coupons.validate_for(code, Some(buyer_id), &priced).await?;
                coupon.calculate_discount(&priced, pricing::subtotal(&priced))
            }
            None => Decimal::ZERO,
        };
        let totals = OrderTotals::compute(&priced, discount, self.vat_rate);

        let shipping = self.addresses.resolve(buyer_id, command.shipping_address_id, AddressType::Shipping).await?;
        let billing = self.addresses.resolve(buyer_id, command.billing_address_id, AddressType::Billing).await?;

        let mut order = Order::place(buyer_id, lines, coupon_code.clone(), totals, shipping, billing)?;
        self.reserve_all(order.items()).await?;
        if let Some(code) = &coupon_code {
            if let Err(e) = self.coupons.record_usage(code, Some(buyer_id), order.id()).await {
                error!(%buyer_id, %code, error = %e, "coupon usage not recorded, releasing stock");
                self.release_all(order.items()).await;
                return Err(e);
            }
        }
        if let Err(e) = self.orders.save_order(&order).await {
            error!(%buyer_id, error = %e, "failed to save order, releasing stock");
            self.release_all(order.items()).await;
            return Err(e.into());
        }

        let ordered: Vec<Uuid> = selected.iter().map(|i| i.id).collect();
        cart.take_items(&ordered);
        self.carts.save(&mut cart).await?;

        info!(order_id = %order.id(), order_number = %order.order_number(), total = %order.total(), "order created");
        publish_all(self.events.as_ref(), order.take_events()).await;
        Ok(order)
    }

    pub async fn get_order(&self, actor: Actor, order_id: Uuid) -> Result<Order> {
        let order = self.load(order_id).await?;
        if !actor.can_access(order.buyer_id()) {
            error!(user_id = %actor.user_id, %order_id, "order belongs to another buyer");
            return Err(EcommerceError::forbidden("Access denied to this order"));
        }
        Ok(order)
    }

    pub async fn list_buyer_orders(&self, buyer_id: Uuid, page: PageRequest) -> Result<Paginated<Order>> {
        Ok(self.orders.list_orders_by_buyer(buyer_id, page).await?)
    }

    pub async fn list_orders(&self, page: PageRequest) -> Result<Paginated<Order>> {
        Ok(self.orders.list_orders(page).await?)
    }

    pub async fn update_status(&self, order_id: Uuid, status: &str) -> Result<Order> {
        info!(%order_id, %status, "updating order status");
        let next = OrderStatus::parse(status).ok_or_else(|| {
            error!(%order_id, %status, "invalid order status");
            EcommerceError::bad_request(format!("Invalid order status: {status}"))
        })?;
        let mut order = self.load(order_id).await?;
        order.transition_to(next)?;
        self.orders.save_order(&order).await?;
        if next == OrderStatus::Cancelled {
            self.release_all(order.items()).await;
        }
        publish_all(self.events.as_ref(), order.take_events()).await;
        Ok(order)
    }

    pub async fn cancel(&self, actor: Actor, order_id: Uuid) -> Result<Order> {
        info!(user_id = %actor.user_id, %order_id, "cancelling order");
        let mut order = self.get_order(actor, order_id).await?;
        order.cancel()?;
        self.orders.save_order(&order).await?;
        self.release_all(order.items()).await;
        publish_all(self.events.as_ref(), order.take_events()).await;
        Ok(order)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order> {
        self.orders.find_order(order_id).await?.ok_or_else(|| {
            error!(%order_id, "order not found");
            EcommerceError::OrderNotFound(order_id)
        })
    }

    /// Reserves every line or none of them.
    async fn reserve_all(&self, lines: &[OrderItem]) -> Result<()> {
        for (done, line) in lines.iter().enumerate() {
            let reserved = match self.products.reserve_stock(line.product_id, line.quantity).await {
                Ok(reserved) => reserved,
                Err(e) => {
                    self.release_all(&lines[..done]).await;
                    return Err(e.into());
                }
            };
            if !reserved {
                warn!(product_id = %line.product_id, quantity = line.quantity, "stock reservation failed");
                self.release_all(&lines[..done]).await;
                let available = self.products.find_product(line.product_id).await?.map(|p| p.stock().value()).unwrap_or(0);
                return Err(CartError::InsufficientStock { product_id: line.product_id, requested: line.quantity, available }.into());
            }
        }
        Ok(())
    }

    async fn release_all(&self, lines: &[OrderItem]) {
        for line in lines {
            if let Err(e) = self.products.release_stock(line.product_id, line.quantity).await {
                error!(product_id = %line.product_id, quantity = line.quantity, error = %e, "failed to release stock");
            }
        }
    }
}
